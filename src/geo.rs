use glam::DVec3;

/// Mean Earth radius in meters, used for meter/radian conversions.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A position on the globe: longitude/latitude in radians, height in meters
/// above the reference surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
}

impl GeoPosition {
    pub fn new(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Same horizontal position with the vertical component replaced.
    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }

    /// Offsets the position by local east/north meters. Small-offset
    /// approximation; degenerate within a few meters of the poles.
    pub fn offset_by_meters(&self, east: f64, north: f64) -> GeoPosition {
        let cos_lat = self.lat.cos().abs().max(1e-9);
        GeoPosition {
            lon: self.lon + east / (EARTH_RADIUS_M * cos_lat),
            lat: self.lat + north / EARTH_RADIUS_M,
            height: self.height,
        }
    }

    /// Local east/north/up displacement from `self` to `other`, in meters.
    pub fn enu_displacement_to(&self, other: &GeoPosition) -> DVec3 {
        let mid_lat = 0.5 * (self.lat + other.lat);
        DVec3::new(
            (other.lon - self.lon) * EARTH_RADIUS_M * mid_lat.cos(),
            (other.lat - self.lat) * EARTH_RADIUS_M,
            other.height - self.height,
        )
    }
}

/// Cache key: quantized (longitude, latitude) bucket at a fixed angular
/// resolution. Positions inside the same resolution cell map to the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketId {
    pub x: i64,
    pub y: i64,
}

impl BucketId {
    pub fn from_position(position: &GeoPosition, resolution: f64) -> Self {
        Self {
            x: (position.lon / resolution).floor() as i64,
            y: (position.lat / resolution).floor() as i64,
        }
    }

    pub fn offset(&self, dx: i64, dy: i64) -> BucketId {
        BucketId {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Geographic center of the bucket, at height zero.
    pub fn center(&self, resolution: f64) -> GeoPosition {
        GeoPosition::new(
            (self.x as f64 + 0.5) * resolution,
            (self.y as f64 + 0.5) * resolution,
            0.0,
        )
    }
}

/// Fractional offset of a position inside its bucket, each component in [0, 1).
pub fn cell_fraction(position: &GeoPosition, resolution: f64) -> (f64, f64) {
    let fx = position.lon / resolution;
    let fy = position.lat / resolution;
    (fx - fx.floor(), fy - fy.floor())
}

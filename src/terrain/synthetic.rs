//! Noise-backed stand-in for the engine's height probes, used by tests and
//! demos. The fast tier sees only the rolling base terrain; the precise tier
//! additionally sees scattered flat-topped structures, each carrying an
//! exclude handle so callers can mask their own model out of a probe.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::geo::GeoPosition;
use crate::probe::{ExcludeHandle, ExcludeSet, HeightProbe};

// Stretch factor from radians to noise-space so adjacent buckets vary gently.
const NOISE_SCALE: f64 = 2_000.0;

struct Structure {
    lon: f64,
    lat: f64,
    radius: f64,
    top: f64,
    handle: ExcludeHandle,
}

pub struct SyntheticTerrain {
    fbm: Fbm<Perlin>,
    amplitude: f64,
    structures: Vec<Structure>,
}

impl SyntheticTerrain {
    /// Rolling terrain only, no 3D content.
    pub fn new(seed: u32) -> Self {
        let fbm = Fbm::<Perlin>::new(seed).set_octaves(4).set_persistence(0.5);
        Self {
            fbm,
            amplitude: 40.0,
            structures: Vec::new(),
        }
    }

    /// Terrain plus `count` structures scattered within `area_radius`
    /// radians of `center`, deterministically from the seed.
    pub fn with_structures(
        seed: u32,
        count: usize,
        center: &GeoPosition,
        area_radius: f64,
    ) -> Self {
        let mut terrain = Self::new(seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        for _ in 0..count {
            let lon = center.lon + rng.random_range(-area_radius..=area_radius);
            let lat = center.lat + rng.random_range(-area_radius..=area_radius);
            let base = terrain.base_height(lon, lat);
            terrain.structures.push(Structure {
                lon,
                lat,
                radius: rng.random_range(1e-5..5e-5),
                top: base + rng.random_range(8.0..40.0),
                handle: ExcludeHandle::new(),
            });
        }
        terrain
    }

    pub fn structure_handles(&self) -> Vec<ExcludeHandle> {
        self.structures.iter().map(|s| s.handle).collect()
    }

    /// Top height of structure `index`, for assertions in tests.
    pub fn structure_top(&self, index: usize) -> Option<(GeoPosition, f64)> {
        self.structures
            .get(index)
            .map(|s| (GeoPosition::new(s.lon, s.lat, 0.0), s.top))
    }

    fn base_height(&self, lon: f64, lat: f64) -> f64 {
        self.amplitude * self.fbm.get([lon * NOISE_SCALE, lat * NOISE_SCALE])
    }
}

impl HeightProbe for SyntheticTerrain {
    fn fast_height(&self, position: &GeoPosition) -> Option<f64> {
        Some(self.base_height(position.lon, position.lat))
    }

    fn precise_height(&self, position: &GeoPosition, exclude: &ExcludeSet) -> Option<f64> {
        let mut height = self.base_height(position.lon, position.lat);
        for s in &self.structures {
            if exclude.contains(&s.handle) {
                continue;
            }
            let dlon = position.lon - s.lon;
            let dlat = position.lat - s.lat;
            if dlon * dlon + dlat * dlat <= s.radius * s.radius {
                height = height.max(s.top);
            }
        }
        Some(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn same_seed_reproduces_the_field() {
        let a = SyntheticTerrain::new(11);
        let b = SyntheticTerrain::new(11);
        let p = GeoPosition::new(0.31, -0.42, 0.0);
        assert_eq!(a.fast_height(&p), b.fast_height(&p));
    }

    #[test]
    fn fast_tier_does_not_see_structures() {
        let center = GeoPosition::new(0.1, 0.1, 0.0);
        let terrain = SyntheticTerrain::with_structures(5, 1, &center, 1e-3);
        let (at, top) = terrain.structure_top(0).unwrap();

        let fast = terrain.fast_height(&at).unwrap();
        let precise = terrain.precise_height(&at, &ExcludeSet::new()).unwrap();
        assert_relative_eq!(precise, top, epsilon = 1e-9);
        assert!(fast < top);
    }

    #[test]
    fn excluded_structures_are_invisible_to_the_precise_tier() {
        let center = GeoPosition::new(0.1, 0.1, 0.0);
        let terrain = SyntheticTerrain::with_structures(5, 1, &center, 1e-3);
        let (at, top) = terrain.structure_top(0).unwrap();
        let handle = terrain.structure_handles()[0];

        let masked = terrain
            .precise_height(&at, &ExcludeSet::single(handle))
            .unwrap();
        assert!(masked < top);
        assert_eq!(masked, terrain.fast_height(&at).unwrap());
    }
}

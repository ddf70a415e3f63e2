use std::collections::HashMap;
use std::time::Instant;

use crate::geo::{BucketId, GeoPosition, cell_fraction};

/// One sampled ground height. Owned by the cache's grid; overwritten when a
/// newer sample for the same bucket resolves, removed only by a full clear.
#[derive(Debug, Clone, Copy)]
pub struct GridCell {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
    pub expires_at: Instant,
}

impl GridCell {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Result of an interpolated lookup. `stale` lists corner buckets whose cell
/// had already expired and was used as a degraded fallback; the cache owes
/// those buckets a background refresh.
pub(crate) struct Interpolated {
    pub height: f64,
    pub stale: Vec<BucketId>,
}

/// The sampled height field itself, keyed by quantized position.
pub(crate) struct HeightGrid {
    cells: HashMap<BucketId, GridCell>,
    resolution: f64,
}

impl HeightGrid {
    pub fn new(resolution: f64) -> Self {
        Self {
            cells: HashMap::new(),
            resolution,
        }
    }

    pub fn insert(&mut self, bucket: BucketId, cell: GridCell) {
        self.cells.insert(bucket, cell);
    }

    pub fn get(&self, bucket: &BucketId) -> Option<&GridCell> {
        self.cells.get(bucket)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Bilinear interpolation over the 2x2 bucket neighborhood surrounding
    /// `position`. Requires at least 3 of the 4 corner cells to be populated;
    /// a missing corner is filled with the mean of the present ones. Expired
    /// corners still contribute but are reported back in `stale`.
    pub fn interpolate(&self, position: &GeoPosition, now: Instant) -> Option<Interpolated> {
        let base = BucketId::from_position(position, self.resolution);
        let corners = [
            base,
            base.offset(1, 0),
            base.offset(0, 1),
            base.offset(1, 1),
        ];

        let mut heights = [None; 4];
        let mut stale = Vec::new();
        let mut populated = 0usize;
        let mut sum = 0.0;
        for (slot, bucket) in heights.iter_mut().zip(corners) {
            if let Some(cell) = self.cells.get(&bucket) {
                *slot = Some(cell.height);
                populated += 1;
                sum += cell.height;
                if !cell.is_fresh(now) {
                    stale.push(bucket);
                }
            }
        }
        if populated < 3 {
            return None;
        }

        let fill = sum / populated as f64;
        let h = heights.map(|h| h.unwrap_or(fill));
        let (fx, fy) = cell_fraction(position, self.resolution);
        let height = h[0] * (1.0 - fx) * (1.0 - fy)
            + h[1] * fx * (1.0 - fy)
            + h[2] * (1.0 - fx) * fy
            + h[3] * fx * fy;
        Some(Interpolated { height, stale })
    }
}

//! Continuous ground clamping for ground vehicles.

use std::sync::Arc;

use glam::DVec3;
use tracing::trace;

use crate::config::ClampConfig;
use crate::geo::GeoPosition;
use crate::probe::ExcludeSet;
use crate::terrain::HeightFieldCache;

/// Keeps a ground vehicle glued to the terrain without visible popping.
///
/// Runs every frame in one of two modes, selected purely by the frame
/// counter: on recalibration frames a precise height is adopted outright; on
/// every other frame the cheap height is blended toward the last known value
/// so small cache corrections never show up as a snap. When no tier has data
/// the last known height is held unchanged (fail-static).
///
/// One instance per vehicle; state is never shared.
pub struct TerrainClamper {
    cache: Arc<HeightFieldCache>,
    config: ClampConfig,
    frame: u64,
    last_known_height: Option<f64>,
    last_position: Option<GeoPosition>,
    velocity: DVec3,
}

impl TerrainClamper {
    pub fn new(cache: Arc<HeightFieldCache>, config: ClampConfig) -> Self {
        Self {
            cache,
            config,
            frame: 0,
            last_known_height: None,
            last_position: None,
            velocity: DVec3::ZERO,
        }
    }

    /// Last resolved (or held) ground height, if any frame has run yet.
    pub fn last_known_height(&self) -> Option<f64> {
        self.last_known_height
    }

    /// Local east/north/up displacement between the two most recent calls,
    /// in meters per tick. Available to dependent logic such as lean or
    /// suspension animation.
    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Returns `position` with its vertical component replaced by the
    /// ground-following height plus the configured ride offset.
    pub fn clamp_to_ground(&mut self, position: &GeoPosition, exclude: &ExcludeSet) -> GeoPosition {
        self.frame += 1;

        if let Some(prev) = self.last_position {
            self.velocity = prev.enu_displacement_to(position);
        }
        self.last_position = Some(*position);

        if self.frame % self.config.refresh_period == 0 {
            self.cache.update_grid(position, exclude);
        }

        // Until a tier resolves, the input height is the best we have.
        let last = self.last_known_height.get_or_insert(position.height);

        if self.frame % self.config.full_check_interval == 0 {
            // Recalibration frame: trust ground truth unconditionally.
            if let Some(precise) = self.cache.resolve(position, true, exclude) {
                trace!(height = precise.height, "clamp recalibrated");
                *last = precise.height;
            }
        } else if let Some(cached) = self.cache.resolve(position, false, exclude) {
            *last += (cached.height - *last) * self.config.smoothing_factor;
        }

        position.with_height(*last + self.config.ground_offset)
    }
}

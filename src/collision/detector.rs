use std::sync::Arc;

use glam::DVec3;
use tracing::debug;

use crate::config::{AircraftConfig, CarConfig};
use crate::geo::GeoPosition;
use crate::probe::ExcludeSet;
use crate::terrain::HeightFieldCache;

/// Outcome of an aircraft ground-collision check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AircraftCheck {
    pub collision: bool,
    pub ground_height: Option<f64>,
}

/// Outcome of a ground-vehicle obstacle check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarCheck {
    pub front: bool,
    pub back: bool,
    pub ground_height: Option<f64>,
}

/// Per-vehicle collision detector.
///
/// Owns its own frame counter and never shares state between vehicles; every
/// vehicle instance gets its own detector, all of them pointing at one shared
/// cache. Both paths are throttled so the height-resolution machinery runs on
/// a small fraction of frames, and both fail safe: missing height data is
/// reported as "no collision", never the other way around.
pub struct CollisionDetector {
    cache: Arc<HeightFieldCache>,
    aircraft: AircraftConfig,
    car: CarConfig,
    frame: u64,
}

impl CollisionDetector {
    pub fn new(cache: Arc<HeightFieldCache>, aircraft: AircraftConfig, car: CarConfig) -> Self {
        Self {
            cache,
            aircraft,
            car,
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Aircraft path: altitude-dependent throttling plus a two-stage
    /// confirm. A cheap (possibly interpolated, possibly stale) height only
    /// arms the check; the collision is reported when ground truth agrees.
    /// That keeps false positives from stale cache data out while confining
    /// expensive precise queries to the rare near-ground window.
    pub fn check_aircraft_collision(
        &mut self,
        position: &GeoPosition,
        _heading: f64,
        exclude: &ExcludeSet,
    ) -> AircraftCheck {
        self.frame += 1;
        let altitude = position.height;
        let interval = if altitude > self.aircraft.min_altitude {
            self.aircraft.high_alt_interval
        } else {
            self.aircraft.check_interval
        };
        if self.frame % interval != 0 {
            return AircraftCheck::default();
        }

        // Keep the cells around the aircraft warm; rate-limited internally.
        self.cache.update_grid(position, exclude);

        let Some(fast) = self.cache.resolve(position, false, exclude) else {
            return AircraftCheck::default();
        };
        if altitude > fast.height + self.aircraft.safety_buffer {
            return AircraftCheck {
                collision: false,
                ground_height: Some(fast.height),
            };
        }

        // Speculative trigger fired; confirm against ground truth.
        match self.cache.resolve(position, true, exclude) {
            Some(precise) => {
                let collision = altitude <= precise.height + self.aircraft.confirm_buffer;
                if collision {
                    debug!(altitude, ground = precise.height, "aircraft ground collision");
                }
                AircraftCheck {
                    collision,
                    ground_height: Some(precise.height),
                }
            }
            None => AircraftCheck {
                collision: false,
                ground_height: Some(fast.height),
            },
        }
    }

    /// Ground-vehicle path: coarse background refresh, a motion gate (a
    /// near-stationary vehicle cannot imminently collide), and one probe
    /// point ahead of and behind the vehicle along its heading. A side
    /// reports a collision when the ground there rises more than the
    /// obstacle threshold above the vehicle's own ground height.
    ///
    /// `heading` is radians, 0 = north, clockwise positive. `velocity` is
    /// the local east/north/up velocity in m/s.
    pub fn check_car_collision(
        &mut self,
        position: &GeoPosition,
        heading: f64,
        velocity: DVec3,
        exclude: &ExcludeSet,
    ) -> CarCheck {
        self.frame += 1;
        if self.frame % self.car.refresh_period == 0 {
            self.cache.update_grid(position, exclude);
        }
        if self.frame % self.car.check_interval != 0 {
            return CarCheck::default();
        }
        if velocity.length() < self.car.min_speed {
            return CarCheck::default();
        }

        let Some(center) = self.cache.resolve(position, false, exclude) else {
            return CarCheck::default();
        };

        let (sin, cos) = heading.sin_cos();
        let d = self.car.probe_distance;
        let front_point = position.offset_by_meters(d * sin, d * cos);
        let back_point = position.offset_by_meters(-d * sin, -d * cos);
        let front = self.side_blocked(&front_point, center.height, exclude);
        let back = self.side_blocked(&back_point, center.height, exclude);
        if front || back {
            debug!(front, back, "ground vehicle obstacle");
        }
        CarCheck {
            front,
            back,
            ground_height: Some(center.height),
        }
    }

    fn side_blocked(&self, point: &GeoPosition, center_height: f64, exclude: &ExcludeSet) -> bool {
        match self.cache.resolve(point, false, exclude) {
            Some(probe) => probe.height - center_height > self.car.obstacle_threshold,
            // Fail-safe on missing data for that side.
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::geo::BucketId;
    use crate::probe::{Clock, HeightProbe, ManualClock};
    use crate::terrain::SampleWorker;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RES: f64 = 1e-4;

    /// Probe with independently scriptable fast and precise tiers, keyed by
    /// bucket so probe points ahead/behind the vehicle can differ.
    struct SplitProbe {
        fast: Mutex<HashMap<BucketId, f64>>,
        fast_default: Mutex<Option<f64>>,
        precise_default: Mutex<Option<f64>>,
        fast_calls: AtomicUsize,
        precise_calls: AtomicUsize,
    }

    impl SplitProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fast: Mutex::new(HashMap::new()),
                fast_default: Mutex::new(None),
                precise_default: Mutex::new(None),
                fast_calls: AtomicUsize::new(0),
                precise_calls: AtomicUsize::new(0),
            })
        }

        fn set_fast_default(&self, height: Option<f64>) {
            *self.fast_default.lock().unwrap() = height;
        }

        fn set_fast_at(&self, bucket: BucketId, height: f64) {
            self.fast.lock().unwrap().insert(bucket, height);
        }

        fn set_precise_default(&self, height: Option<f64>) {
            *self.precise_default.lock().unwrap() = height;
        }

        fn fast_calls(&self) -> usize {
            self.fast_calls.load(Ordering::SeqCst)
        }
    }

    impl HeightProbe for SplitProbe {
        fn fast_height(&self, position: &GeoPosition) -> Option<f64> {
            self.fast_calls.fetch_add(1, Ordering::SeqCst);
            let bucket = BucketId::from_position(position, RES);
            self.fast
                .lock()
                .unwrap()
                .get(&bucket)
                .copied()
                .or(*self.fast_default.lock().unwrap())
        }

        fn precise_height(&self, _position: &GeoPosition, _exclude: &ExcludeSet) -> Option<f64> {
            self.precise_calls.fetch_add(1, Ordering::SeqCst);
            *self.precise_default.lock().unwrap()
        }
    }

    fn detector_with(probe: Arc<SplitProbe>) -> CollisionDetector {
        let (det, _cache) = detector_and_cache(probe);
        det
    }

    fn detector_and_cache(probe: Arc<SplitProbe>) -> (CollisionDetector, Arc<HeightFieldCache>) {
        let cache = Arc::new(HeightFieldCache::with_parts(
            GridConfig::default(),
            probe,
            Arc::new(ManualClock::new()) as Arc<dyn Clock>,
            SampleWorker::inline(),
        ));
        let det = CollisionDetector::new(
            Arc::clone(&cache),
            AircraftConfig::default(),
            CarConfig::default(),
        );
        (det, cache)
    }

    fn at_altitude(altitude: f64) -> GeoPosition {
        GeoPosition::new(0.5 * RES, 0.5 * RES, altitude)
    }

    #[test]
    fn high_altitude_uses_relaxed_interval() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(0.0));
        let mut det = detector_with(Arc::clone(&probe));

        for _ in 0..60 {
            det.check_aircraft_collision(&at_altitude(600.0), 0.0, &ExcludeSet::new());
        }
        // Only frames 30 and 60 resolve a height.
        assert_eq!(probe.fast_calls(), 2);
    }

    #[test]
    fn low_altitude_uses_tight_interval() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(0.0));
        let mut det = detector_with(Arc::clone(&probe));

        for _ in 0..80 {
            det.check_aircraft_collision(&at_altitude(100.0), 0.0, &ExcludeSet::new());
        }
        // Frames 8, 16, ..., 80.
        assert_eq!(probe.fast_calls(), 10);
    }

    #[test]
    fn stale_interpolated_height_never_confirms_collision() {
        let probe = SplitProbe::new();
        // Fill the cache while the terrain reads 98 m, then have ground
        // truth drop to 90 m. The cheap stage sees the stale 98 and arms the
        // check; the precise confirm must veto it.
        probe.set_precise_default(Some(98.0));
        let (mut det, cache) = detector_and_cache(Arc::clone(&probe));
        cache.update_grid(&at_altitude(100.0), &ExcludeSet::new());
        cache.tick();
        probe.set_precise_default(Some(90.0));

        let mut confirmed = false;
        let mut armed = false;
        for _ in 0..8 {
            let check = det.check_aircraft_collision(&at_altitude(100.0), 0.0, &ExcludeSet::new());
            armed |= check.ground_height == Some(90.0);
            confirmed |= check.collision;
        }
        // The precise stage ran (reporting 90) and vetoed the collision.
        assert!(armed);
        assert!(!confirmed);
    }

    #[test]
    fn missing_fast_height_is_no_collision() {
        let probe = SplitProbe::new();
        let mut det = detector_with(Arc::clone(&probe));
        for _ in 0..8 {
            let check = det.check_aircraft_collision(&at_altitude(3.0), 0.0, &ExcludeSet::new());
            assert!(!check.collision);
            assert!(check.ground_height.is_none());
        }
    }

    #[test]
    fn confirmed_impact_reports_collision() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(99.8));
        probe.set_precise_default(Some(99.8));
        let mut det = detector_with(Arc::clone(&probe));

        let mut hit = None;
        for _ in 0..8 {
            let check = det.check_aircraft_collision(&at_altitude(100.0), 0.0, &ExcludeSet::new());
            if check.collision {
                hit = check.ground_height;
            }
        }
        // altitude 100 <= 99.8 + 0.5 confirm buffer
        assert_eq!(hit, Some(99.8));
    }

    #[test]
    fn stationary_car_skips_checks() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(0.0));
        let mut det = detector_with(Arc::clone(&probe));

        for _ in 0..16 {
            let check = det.check_car_collision(
                &at_altitude(0.5),
                0.0,
                DVec3::new(0.0, 0.1, 0.0),
                &ExcludeSet::new(),
            );
            assert_eq!(check, CarCheck::default());
        }
        assert_eq!(probe.fast_calls(), 0);
    }

    #[test]
    fn wall_ahead_blocks_front_only() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(0.0));
        // A 3 m rise in the bucket north of the vehicle. The 2 m probe
        // distance is small against the bucket size, so park the vehicle
        // near the cell's north edge to push the front probe over it.
        let position = GeoPosition::new(0.5 * RES, 0.9999 * RES, 0.5);
        let vehicle_bucket = BucketId::from_position(&position, RES);
        probe.set_fast_at(vehicle_bucket.offset(0, 1), 3.0);
        let mut det = detector_with(Arc::clone(&probe));

        let mut seen = CarCheck::default();
        for _ in 0..4 {
            // Heading north at 5 m/s.
            let check = det.check_car_collision(
                &position,
                0.0,
                DVec3::new(0.0, 5.0, 0.0),
                &ExcludeSet::new(),
            );
            if check.ground_height.is_some() {
                seen = check;
            }
        }
        assert!(seen.front);
        assert!(!seen.back);
        assert_eq!(seen.ground_height, Some(0.0));
    }

    #[test]
    fn climbable_rise_is_not_an_obstacle() {
        let probe = SplitProbe::new();
        probe.set_fast_default(Some(0.0));
        let position = GeoPosition::new(0.5 * RES, 0.9999 * RES, 0.5);
        let vehicle_bucket = BucketId::from_position(&position, RES);
        probe.set_fast_at(vehicle_bucket.offset(0, 1), 1.0);
        let mut det = detector_with(Arc::clone(&probe));

        for _ in 0..4 {
            let check = det.check_car_collision(
                &position,
                0.0,
                DVec3::new(0.0, 5.0, 0.0),
                &ExcludeSet::new(),
            );
            assert!(!check.front);
            assert!(!check.back);
        }
    }
}

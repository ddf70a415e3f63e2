use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPosition;

/// Stable handle for a scene element that height probes can be told to
/// ignore (typically the querying vehicle's own model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExcludeHandle(Uuid);

impl ExcludeHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExcludeHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Set of scene-element handles excluded from precise probing.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    handles: HashSet<ExcludeHandle>,
}

impl ExcludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(handle: ExcludeHandle) -> Self {
        let mut set = Self::new();
        set.insert(handle);
        set
    }

    pub fn insert(&mut self, handle: ExcludeHandle) {
        self.handles.insert(handle);
    }

    pub fn contains(&self, handle: &ExcludeHandle) -> bool {
        self.handles.contains(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}

/// The external height source, with its two cost tiers.
///
/// `fast_height` is terrain-only and cheap enough to call every tick.
/// `precise_height` is aware of dense scene content and costs a full extra
/// render pass in the real engine, so callers are expected to invoke it
/// sparingly. Both report missing data as `None`; neither tier errors.
pub trait HeightProbe: Send + Sync {
    fn fast_height(&self, position: &GeoPosition) -> Option<f64>;

    fn precise_height(&self, position: &GeoPosition, exclude: &ExcludeSet) -> Option<f64>;
}

/// Monotonic clock used for TTL and refresh-interval bookkeeping.
/// Injectable so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests and hosts with their own tick timebase.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_set_tracks_handles() {
        let a = ExcludeHandle::new();
        let b = ExcludeHandle::new();
        let mut set = ExcludeSet::single(a);
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
        set.insert(b);
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn manual_clock_advances_monotonically() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(250));
        let t1 = clock.now();
        assert_eq!(t1.duration_since(t0), Duration::from_millis(250));
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::GridConfig;
use crate::geo::{BucketId, GeoPosition};
use crate::probe::{Clock, ExcludeSet, HeightProbe, MonotonicClock};
use crate::terrain::grid::{GridCell, HeightGrid};
use crate::terrain::sampler::{PendingSamples, SampleWorker};

/// Which tier resolved a height query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTier {
    Interpolated,
    FastProbe,
    PreciseProbe,
}

/// Height value tagged with the tier that produced it. Ephemeral; only the
/// height outlives the call, folded into a grid cell by background sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightQueryResult {
    pub height: f64,
    pub tier: ResolvedTier,
}

/// Counters for host diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cells: usize,
    pub pending: usize,
    pub queued: usize,
}

struct SampleRequest {
    bucket: BucketId,
    exclude: ExcludeSet,
}

/// Tiered spatial cache over sampled ground heights.
///
/// Queries resolve cheapest-first: bilinear interpolation over cached cells,
/// then the fast terrain-only probe, then (only when the caller demands
/// precision) the expensive content-aware probe. Background refresh keeps the
/// cells around a consumer populated without blocking the tick that asked.
///
/// One instance owns its grid and pending tables outright; multiple vehicle
/// consumers share it behind an `Arc`.
pub struct HeightFieldCache {
    config: GridConfig,
    probe: Arc<dyn HeightProbe>,
    clock: Arc<dyn Clock>,
    worker: SampleWorker,
    grid: Arc<Mutex<HeightGrid>>,
    pending: Arc<PendingSamples>,
    deferred: Mutex<VecDeque<SampleRequest>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl HeightFieldCache {
    pub fn new(config: GridConfig, probe: Arc<dyn HeightProbe>) -> Self {
        let worker = SampleWorker::pool(0);
        Self::with_parts(config, probe, Arc::new(MonotonicClock), worker)
    }

    /// Full-control constructor; tests pair a `ManualClock` with the inline
    /// worker to make refresh timing and dispatch deterministic.
    pub fn with_parts(
        config: GridConfig,
        probe: Arc<dyn HeightProbe>,
        clock: Arc<dyn Clock>,
        worker: SampleWorker,
    ) -> Self {
        let resolution = config.grid_resolution;
        Self {
            config,
            probe,
            clock,
            worker,
            grid: Arc::new(Mutex::new(HeightGrid::new(resolution))),
            pending: Arc::new(PendingSamples::new()),
            deferred: Mutex::new(VecDeque::new()),
            last_refresh: Mutex::new(None),
        }
    }

    /// Resolves a ground height for `position`, or `None` when every
    /// eligible tier comes up empty. See [`resolve`](Self::resolve) for the
    /// tier-tagged variant.
    pub fn get_height(&self, position: &GeoPosition, needs_precision: bool) -> Option<f64> {
        self.resolve(position, needs_precision, &ExcludeSet::new())
            .map(|r| r.height)
    }

    /// Tiered resolution:
    ///
    /// 1. Unless precision is demanded, bilinear interpolation over the
    ///    surrounding 2x2 cells (needs at least 3 populated corners).
    /// 2. The fast terrain-only probe.
    /// 3. Only if the fast probe produced nothing *and* precision was
    ///    demanded, the expensive precise probe.
    ///
    /// Expired cells still interpolate as a degraded fallback, but the
    /// affected buckets are queued for a background refresh.
    pub fn resolve(
        &self,
        position: &GeoPosition,
        needs_precision: bool,
        exclude: &ExcludeSet,
    ) -> Option<HeightQueryResult> {
        if !needs_precision {
            if let Some(height) = self.interpolated(position) {
                trace!(height, "height resolved from interpolated cache");
                return Some(HeightQueryResult {
                    height,
                    tier: ResolvedTier::Interpolated,
                });
            }
        }

        if let Some(height) = self.probe.fast_height(position) {
            trace!(height, "height resolved from fast probe");
            return Some(HeightQueryResult {
                height,
                tier: ResolvedTier::FastProbe,
            });
        }

        if needs_precision {
            if let Some(height) = self.probe.precise_height(position, exclude) {
                debug!(height, "height resolved from precise probe");
                return Some(HeightQueryResult {
                    height,
                    tier: ResolvedTier::PreciseProbe,
                });
            }
        }

        None
    }

    fn interpolated(&self, position: &GeoPosition) -> Option<f64> {
        let now = self.clock.now();
        let (height, stale) = {
            let grid = self.grid.lock().unwrap();
            let out = grid.interpolate(position, now)?;
            (out.height, out.stale)
        };
        if !stale.is_empty() {
            debug!(
                buckets = stale.len(),
                "interpolation used expired cells; scheduling refresh"
            );
            self.queue_samples(stale, &ExcludeSet::new());
        }
        Some(height)
    }

    /// Requests a background refresh of the N x N bucket neighborhood around
    /// `center`. Fire-and-forget, and globally rate-limited per instance:
    /// calls within the minimum refresh interval are no-ops. Fresh cells and
    /// buckets with a sample already in flight are skipped; the rest are
    /// queued and dispatched on the next [`tick`](Self::tick).
    pub fn update_grid(&self, center: &GeoPosition, exclude: &ExcludeSet) {
        let now = self.clock.now();
        {
            let mut last = self.last_refresh.lock().unwrap();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.config.refresh_interval() {
                    trace!("grid refresh throttled");
                    return;
                }
            }
            *last = Some(now);
        }

        let half = self.config.neighborhood_size / 2;
        let center_bucket = BucketId::from_position(center, self.config.grid_resolution);
        let mut due = Vec::new();
        {
            let grid = self.grid.lock().unwrap();
            for dy in -half..=half {
                for dx in -half..=half {
                    let bucket = center_bucket.offset(dx, dy);
                    if grid.get(&bucket).is_some_and(|cell| cell.is_fresh(now)) {
                        continue;
                    }
                    due.push(bucket);
                }
            }
        }
        debug!(buckets = due.len(), "grid refresh scheduled");
        self.queue_samples(due, exclude);
    }

    /// Dispatches samples deferred by earlier refresh requests onto the
    /// worker. The host calls this once per simulation tick, which keeps
    /// probe bursts off the frame that requested them.
    pub fn tick(&self) {
        let batch: Vec<SampleRequest> = self.deferred.lock().unwrap().drain(..).collect();
        for request in batch {
            self.dispatch(request);
        }
    }

    /// Drops every cell, pending entry and queued sample. A sample already
    /// dispatched to the worker is not cancelled and may repopulate one
    /// bucket after the clear.
    pub fn clear_cache(&self) {
        self.grid.lock().unwrap().clear();
        self.pending.clear();
        self.deferred.lock().unwrap().clear();
        debug!("height field cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cells: self.grid.lock().unwrap().len(),
            pending: self.pending.len(),
            queued: self.deferred.lock().unwrap().len(),
        }
    }

    fn queue_samples(&self, buckets: Vec<BucketId>, exclude: &ExcludeSet) {
        let mut deferred = self.deferred.lock().unwrap();
        for bucket in buckets {
            // Admission control: one in-flight sample per bucket.
            if !self.pending.try_admit(bucket) {
                continue;
            }
            deferred.push_back(SampleRequest {
                bucket,
                exclude: exclude.clone(),
            });
        }
    }

    fn dispatch(&self, request: SampleRequest) {
        let probe = Arc::clone(&self.probe);
        let grid = Arc::clone(&self.grid);
        let pending = Arc::clone(&self.pending);
        let clock = Arc::clone(&self.clock);
        let ttl = self.config.cache_ttl();
        let position = request.bucket.center(self.config.grid_resolution);
        self.worker.execute(move || {
            match probe.precise_height(&position, &request.exclude) {
                Some(height) => {
                    let cell = GridCell {
                        lon: position.lon,
                        lat: position.lat,
                        height,
                        expires_at: clock.now() + ttl,
                    };
                    grid.lock().unwrap().insert(request.bucket, cell);
                }
                None => {
                    // Swallowed: the bucket stays unset and is retried on the
                    // next eligible refresh cycle.
                    warn!(bucket = ?request.bucket, "background sample failed");
                }
            }
            pending.release(request.bucket);
        });
    }
}

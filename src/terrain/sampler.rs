use std::collections::HashSet;
use std::sync::Mutex;

use rayon::ThreadPoolBuilder;

use crate::geo::BucketId;

/// Executor for background precise-probe samples.
///
/// `Pool` is the production mode: a small rayon pool adapted to keep sample
/// bursts off the simulation thread. `Inline` runs each sample on the calling
/// thread at dispatch time, which makes tests and strictly single-threaded
/// hosts deterministic.
pub enum SampleWorker {
    Pool(rayon::ThreadPool),
    Inline,
}

impl SampleWorker {
    /// Builds a pooled worker. A `threads` value of 0 sizes the pool to the
    /// machine, leaving one core for the simulation thread.
    pub fn pool(threads: usize) -> Self {
        let threads = if threads > 0 {
            threads
        } else {
            std::cmp::max(1, num_cpus::get().saturating_sub(1))
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("Failed to build Rayon thread pool");
        SampleWorker::Pool(pool)
    }

    pub fn inline() -> Self {
        SampleWorker::Inline
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            SampleWorker::Pool(pool) => pool.spawn(job),
            SampleWorker::Inline => job(),
        }
    }
}

/// Admission table for in-flight samples: at most one per bucket.
pub(crate) struct PendingSamples {
    inner: Mutex<HashSet<BucketId>>,
}

impl PendingSamples {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    /// Registers the bucket if it is not already in flight. Returns false
    /// when a sample for this bucket is pending, in which case the caller
    /// must not dispatch another.
    pub fn try_admit(&self, bucket: BucketId) -> bool {
        self.inner.lock().unwrap().insert(bucket)
    }

    /// Clears the bucket's in-flight entry, whatever the sample's outcome.
    pub fn release(&self, bucket: BucketId) {
        self.inner.lock().unwrap().remove(&bucket);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

//! The terrain height resolution layer: grid cells, the tiered cache, the
//! background sample worker and a synthetic probe for tests and demos.

pub mod grid;
pub mod height_cache;
pub mod sampler;
pub mod synthetic;

pub use grid::GridCell;
pub use height_cache::{CacheStats, HeightFieldCache, HeightQueryResult, ResolvedTier};
pub use sampler::SampleWorker;
pub use synthetic::SyntheticTerrain;

//! groundcast — terrain height resolution and collision layer for a
//! globe-based vehicle simulation.
//!
//! The only authoritative height source is an external probe that costs a
//! full render pass per query, yet the simulation needs near-real-time
//! ground heights every frame. This crate makes those queries cheap with a
//! tiered cache and layers two consumers on top of it:
//!
//! - [`HeightFieldCache`] — spatial grid cache with tiered resolution
//!   (interpolated cells, then the fast terrain-only probe, then the
//!   expensive precise probe) and deduplicated, rate-limited background
//!   refresh.
//! - [`CollisionDetector`] — throttled ground-collision checks with a
//!   two-stage confirm for aircraft and front/back obstacle probes for
//!   ground vehicles.
//! - [`TerrainClamper`] — continuous ground following with periodic
//!   recalibration and inter-frame smoothing.
//!
//! The engine side is abstracted behind [`probe::HeightProbe`]; a
//! noise-backed [`SyntheticTerrain`] implementation ships for tests and
//! demos. Missing data is `None` everywhere — consumers fail static, never
//! alarm on absent data.

pub mod clamp;
pub mod collision;
pub mod config;
pub mod error;
pub mod geo;
pub mod probe;
pub mod terrain;

pub use clamp::TerrainClamper;
pub use collision::{AircraftCheck, CarCheck, CollisionDetector};
pub use config::{AircraftConfig, CarConfig, ClampConfig, GridConfig, SimulationConfig};
pub use error::ConfigError;
pub use geo::{BucketId, GeoPosition};
pub use probe::{Clock, ExcludeHandle, ExcludeSet, HeightProbe, ManualClock, MonotonicClock};
pub use terrain::{
    CacheStats, HeightFieldCache, HeightQueryResult, ResolvedTier, SampleWorker, SyntheticTerrain,
};

//! Tunables for the cache and its consumers. Every struct carries working
//! defaults and deserializes from partial files, so hosts only override what
//! they care about.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Height-field cache tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Angular bucket size in radians.
    pub grid_resolution: f64,
    /// How long a sampled cell stays fresh.
    pub cache_ttl_ms: u64,
    /// Side length of the refresh neighborhood (N x N buckets).
    pub neighborhood_size: i64,
    /// Minimum wall-clock gap between refresh cycles.
    pub refresh_interval_ms: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 1e-4,
            cache_ttl_ms: 2000,
            neighborhood_size: 5,
            refresh_interval_ms: 500,
        }
    }
}

impl GridConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Aircraft collision-check tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftConfig {
    /// Above this altitude the relaxed check interval applies.
    pub min_altitude: f64,
    /// Check cadence in frames at low altitude.
    pub check_interval: u64,
    /// Check cadence in frames at high altitude.
    pub high_alt_interval: u64,
    /// Speculative trigger margin above the fast ground height, meters.
    pub safety_buffer: f64,
    /// Confirmation margin above the precise ground height, meters.
    pub confirm_buffer: f64,
}

impl Default for AircraftConfig {
    fn default() -> Self {
        Self {
            min_altitude: 500.0,
            check_interval: 8,
            high_alt_interval: 30,
            safety_buffer: 5.0,
            confirm_buffer: 0.5,
        }
    }
}

/// Ground-vehicle collision-check tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    /// Check cadence in frames.
    pub check_interval: u64,
    /// Probe-point offset ahead of and behind the vehicle, meters.
    pub probe_distance: f64,
    /// Background grid refresh cadence in frames.
    pub refresh_period: u64,
    /// Below this speed (m/s) checks are skipped outright.
    pub min_speed: f64,
    /// Ground rise above the vehicle's own ground height that counts as an
    /// obstacle rather than climbable terrain, meters.
    pub obstacle_threshold: f64,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            check_interval: 4,
            probe_distance: 2.0,
            refresh_period: 30,
            min_speed: 0.5,
            obstacle_threshold: 1.5,
        }
    }
}

/// Terrain-clamping tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampConfig {
    /// Recalibration cadence in frames; on these frames the precise height
    /// is adopted without smoothing.
    pub full_check_interval: u64,
    /// Blend factor toward the cached height on smoothing frames.
    pub smoothing_factor: f64,
    /// Background grid refresh cadence in frames.
    pub refresh_period: u64,
    /// Vertical offset added to the resolved ground height (ride height).
    pub ground_offset: f64,
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            full_check_interval: 15,
            smoothing_factor: 0.3,
            refresh_period: 30,
            ground_offset: 0.0,
        }
    }
}

/// Aggregate configuration, loadable from a TOML or JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub aircraft: AircraftConfig,
    pub car: CarConfig,
    pub clamp: ClampConfig,
}

impl SimulationConfig {
    /// Loads a config file, dispatching on the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.into(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&raw).map_err(|source| ConfigError::Toml {
                path: path.into(),
                source,
            }),
            Some("json") => serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.into(),
                source,
            }),
            _ => Err(ConfigError::UnsupportedFormat { path: path.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.grid.grid_resolution, 1e-4);
        assert_eq!(cfg.grid.cache_ttl_ms, 2000);
        assert_eq!(cfg.grid.neighborhood_size, 5);
        assert_eq!(cfg.grid.refresh_interval_ms, 500);
        assert_eq!(cfg.aircraft.min_altitude, 500.0);
        assert_eq!(cfg.aircraft.check_interval, 8);
        assert_eq!(cfg.aircraft.high_alt_interval, 30);
        assert_eq!(cfg.car.check_interval, 4);
        assert_eq!(cfg.car.probe_distance, 2.0);
        assert_eq!(cfg.clamp.full_check_interval, 15);
        assert_eq!(cfg.clamp.smoothing_factor, 0.3);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: SimulationConfig = toml::from_str(
            r#"
            [grid]
            cache_ttl_ms = 5000

            [car]
            probe_distance = 3.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.grid.cache_ttl_ms, 5000);
        assert_eq!(cfg.grid.neighborhood_size, 5);
        assert_eq!(cfg.car.probe_distance, 3.5);
        assert_eq!(cfg.car.check_interval, 4);
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let mut cfg = SimulationConfig::default();
        cfg.clamp.ground_offset = 0.4;
        let path = std::env::temp_dir().join(format!(
            "groundcast-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        fs::write(&path, toml::to_string(&cfg).unwrap()).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded.clamp.ground_offset, 0.4);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = std::env::temp_dir().join(format!(
            "groundcast-config-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        fs::write(&path, "grid: {}").unwrap();
        let err = SimulationConfig::load(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }
}

//! Configuration for the clock engine
//!
//! Everything has a default matching the published data layout, so
//! `ClockConfig::default().with_data_root(...)` is usually all that is
//! needed. A configuration can also be read from a JSON file, where any
//! field left out keeps its default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::bodies::Body;
use crate::constants::{
    COARSE_TIER, FINE_TIER_DIR, MANIFEST_PATH, SCAN_WINDOW_DAYS, SPEED_RELAXATION,
    SPEED_SNAP_TOLERANCE, TICK_HZ,
};
use crate::data::{self, get_cache_dir, DataSource};
use crate::{ClockError, Result};

/// Settings for an [`Orrery`](crate::Orrery)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Directory or http(s) URL holding the datasets
    pub data_root: String,
    /// Where downloaded documents are mirrored; `None` disables caching
    pub cache_dir: Option<PathBuf>,
    /// Name (and directory) of the coarse tier
    pub coarse_tier: String,
    /// Directory holding the fine tiers
    pub fine_tier_dir: String,
    /// Location of the fine tier manifest
    pub manifest_path: String,
    /// Bracketing samples must be fewer than this many days away
    pub scan_window_days: i64,
    /// Animation ticks per second
    pub tick_hz: f64,
    /// Speed easing: each tick closes 1/relaxation of the gap
    pub speed_relaxation: f64,
    /// Speed easing: relative gap under which the speed snaps
    pub speed_snap_tolerance: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            data_root: "data".to_string(),
            cache_dir: Some(get_cache_dir()),
            coarse_tier: COARSE_TIER.to_string(),
            fine_tier_dir: FINE_TIER_DIR.to_string(),
            manifest_path: MANIFEST_PATH.to_string(),
            scan_window_days: SCAN_WINDOW_DAYS,
            tick_hz: TICK_HZ,
            speed_relaxation: SPEED_RELAXATION,
            speed_snap_tolerance: SPEED_SNAP_TOLERANCE,
        }
    }
}

impl ClockConfig {
    /// Read and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the data root
    pub fn with_data_root(mut self, root: &str) -> Self {
        self.data_root = root.to_string();
        self
    }

    /// Set the download cache directory
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Download without caching
    pub fn without_cache(mut self) -> Self {
        self.cache_dir = None;
        self
    }

    /// Set the bracketing scan window
    pub fn with_scan_window_days(mut self, days: i64) -> Self {
        self.scan_window_days = days;
        self
    }

    /// Set the tick rate
    pub fn with_tick_hz(mut self, hz: f64) -> Self {
        self.tick_hz = hz;
        self
    }

    /// Check that the numbers make sense
    pub fn validate(&self) -> Result<()> {
        if self.scan_window_days < 1 {
            return Err(ClockError::ConfigError(format!(
                "scan_window_days must be at least 1, got {}",
                self.scan_window_days
            )));
        }
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return Err(ClockError::ConfigError(format!(
                "tick_hz must be positive, got {}",
                self.tick_hz
            )));
        }
        if !(self.speed_relaxation.is_finite() && self.speed_relaxation >= 1.0) {
            return Err(ClockError::ConfigError(format!(
                "speed_relaxation must be at least 1, got {}",
                self.speed_relaxation
            )));
        }
        if !(self.speed_snap_tolerance.is_finite() && self.speed_snap_tolerance > 0.0) {
            return Err(ClockError::ConfigError(format!(
                "speed_snap_tolerance must be positive, got {}",
                self.speed_snap_tolerance
            )));
        }
        Ok(())
    }

    /// Document path of a body's coarse dataset
    pub fn coarse_path(&self, body: Body) -> String {
        format!("{}/{}.json", self.coarse_tier, body.name())
    }

    /// Document path of a body's dataset in fine tier `tier`
    pub fn fine_path(&self, tier: &str, body: Body) -> String {
        format!("{}/{}/{}.json", self.fine_tier_dir, tier, body.name())
    }

    /// Time between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz)
    }

    /// Open the data source for `data_root`
    pub fn open_source(&self) -> Box<dyn DataSource> {
        data::open_source(&self.data_root, self.cache_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_layout() {
        let config = ClockConfig::default();
        assert_eq!(config.coarse_path(Body::Sun), "lite/sun.json");
        assert_eq!(
            config.fine_path("1900-2100", Body::Ceres),
            "full/1900-2100/ceres.json"
        );
        assert_eq!(config.manifest_path, "full/index.json");
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("clock.json");
        fs::write(
            &path,
            r#"{"data_root": "https://example.org/clock/data", "scan_window_days": 90, "cache_dir": null}"#,
        )
        .unwrap();

        let config = ClockConfig::from_json_file(&path).unwrap();
        assert_eq!(config.data_root, "https://example.org/clock/data");
        assert_eq!(config.scan_window_days, 90);
        assert_eq!(config.cache_dir, None);
        assert_eq!(config.coarse_tier, "lite");
        assert_eq!(config.tick_hz, 50.0);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            ClockConfig::default().with_scan_window_days(0).validate(),
            Err(ClockError::ConfigError(_))
        ));
        assert!(ClockConfig::default().with_tick_hz(0.0).validate().is_err());

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("clock.json");
        fs::write(&path, r#"{"data_rot": "typo"}"#).unwrap();
        assert!(matches!(
            ClockConfig::from_json_file(&path),
            Err(ClockError::JsonError(_))
        ));
    }
}

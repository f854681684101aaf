// src/config.rs

//! Configuration for the simulator and its archive.
//!
//! Parsed from TOML, with `NBAR_`-prefixed environment variable overrides
//! and validation of the values the archive depends on.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ArchiveError, Result};
use crate::sim::{Gravity, Scheme};

// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub integration: IntegrationConfig,
    pub archive: ArchiveConfig,
}

// Integration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Integration scheme: "symplectic", "extrapolation" or "leapfrog".
    pub scheme: Scheme,
    /// Force model: "none", "basic" or "tree".
    pub gravity: Gravity,
    // Initial step size.
    pub dt: f64,
    // Gravitational constant.
    pub g: f64,
    // Plummer softening length.
    pub softening: f64,
    /// Whether the symplectic scheme resynchronizes its public state after
    /// every step. Off means the faster unsynchronized mode.
    pub safe_mode: bool,
}

// Archive options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    // Target archive file.
    pub path: PathBuf,
    // Simulation-time interval between checkpoint records. Zero disables
    // size estimation and means "every heartbeat writes".
    pub interval: f64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Symplectic,
            gravity: Gravity::Basic,
            dt: 0.01,
            g: 1.0,
            softening: 0.0,
            safe_mode: true,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./archive.bin"),
            interval: 1.0,
        }
    }
}

impl FromStr for SimulationConfig {
    type Err = ArchiveError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ArchiveError::config_with_source("failed to parse TOML config", e))
    }
}

impl SimulationConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ArchiveError::io(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `NBAR_`:
    // - `NBAR_ARCHIVE_PATH` overrides `archive.path`
    // - `NBAR_ARCHIVE_INTERVAL` overrides `archive.interval`
    // - `NBAR_INTEGRATION_DT` overrides `integration.dt`
    // - `NBAR_INTEGRATION_SAFE_MODE` overrides `integration.safe_mode`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("NBAR_ARCHIVE_PATH") {
            self.archive.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("NBAR_ARCHIVE_INTERVAL") {
            if let Ok(v) = val.parse() {
                self.archive.interval = v;
            }
        }
        if let Ok(val) = std::env::var("NBAR_INTEGRATION_DT") {
            if let Ok(v) = val.parse() {
                self.integration.dt = v;
            }
        }
        if let Ok(val) = std::env::var("NBAR_INTEGRATION_SAFE_MODE") {
            if let Ok(v) = val.parse() {
                self.integration.safe_mode = v;
            }
        }
        self
    }

    // Validate all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.integration.dt == 0.0 || !self.integration.dt.is_finite() {
            return Err(ArchiveError::config(
                "integration.dt must be finite and non-zero",
            ));
        }
        if self.integration.g <= 0.0 {
            return Err(ArchiveError::config(
                "integration.g must be greater than 0",
            ));
        }
        if self.integration.softening < 0.0 {
            return Err(ArchiveError::config(
                "integration.softening must not be negative",
            ));
        }
        if self.archive.interval < 0.0 || !self.archive.interval.is_finite() {
            return Err(ArchiveError::config(
                "archive.interval must be finite and not negative",
            ));
        }
        if self.archive.path.as_os_str().is_empty() {
            return Err(ArchiveError::config("archive.path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();

        assert_eq!(config.integration.scheme, Scheme::Symplectic);
        assert_eq!(config.integration.gravity, Gravity::Basic);
        assert_eq!(config.integration.dt, 0.01);
        assert!(config.integration.safe_mode);
        assert_eq!(config.archive.path, PathBuf::from("./archive.bin"));
        assert_eq!(config.archive.interval, 1.0);
    }

    #[test]
    fn test_default_validates() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_str_partial() {
        let toml = r#"
            [integration]
            scheme = "extrapolation"
            dt = 0.001
        "#;
        let config: SimulationConfig = toml.parse().unwrap();

        assert_eq!(config.integration.scheme, Scheme::Extrapolation);
        assert_eq!(config.integration.dt, 0.001);
        // Other fields should be defaults
        assert_eq!(config.integration.gravity, Gravity::Basic);
        assert_eq!(config.archive.interval, 1.0);
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [integration]
            scheme = "symplectic"
            gravity = "none"
            dt = 0.005
            g = 39.476
            softening = 0.001
            safe_mode = false

            [archive]
            path = "/data/run42.bin"
            interval = 10.0
        "#;
        let config: SimulationConfig = toml.parse().unwrap();

        assert_eq!(config.integration.gravity, Gravity::None);
        assert_eq!(config.integration.g, 39.476);
        assert!(!config.integration.safe_mode);
        assert_eq!(config.archive.path, PathBuf::from("/data/run42.bin"));
        assert_eq!(config.archive.interval, 10.0);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<SimulationConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [archive]
            interval = 2.5
            "#
        )
        .unwrap();

        let config = SimulationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.archive.interval, 2.5);
    }

    #[test]
    fn test_from_file_not_found() {
        assert!(SimulationConfig::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn test_validate_zero_dt() {
        let mut config = SimulationConfig::default();
        config.integration.dt = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_negative_interval() {
        let mut config = SimulationConfig::default();
        config.archive.interval = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_path() {
        let mut config = SimulationConfig::default();
        config.archive.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global
    // state.
    #[test]
    fn test_env_overrides() {
        for (key, _) in std::env::vars() {
            if key.starts_with("NBAR_") {
                std::env::remove_var(&key);
            }
        }

        std::env::set_var("NBAR_ARCHIVE_PATH", "/env/archive.bin");
        std::env::set_var("NBAR_ARCHIVE_INTERVAL", "0.25");
        std::env::set_var("NBAR_INTEGRATION_DT", "not_a_number");

        let config = SimulationConfig::default().with_env_overrides();

        assert_eq!(config.archive.path, PathBuf::from("/env/archive.bin"));
        assert_eq!(config.archive.interval, 0.25);
        // Invalid values are ignored, keeping the default
        assert_eq!(config.integration.dt, 0.01);

        std::env::remove_var("NBAR_ARCHIVE_PATH");
        std::env::remove_var("NBAR_ARCHIVE_INTERVAL");
        std::env::remove_var("NBAR_INTEGRATION_DT");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let original = SimulationConfig::default();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: SimulationConfig = toml_str.parse().unwrap();

        assert_eq!(original.integration.dt, parsed.integration.dt);
        assert_eq!(original.archive.path, parsed.archive.path);
    }
}

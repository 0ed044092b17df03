//! Lab configuration: ports, simulation group layout and driver timing.
//!
//! Every field has a default so a partial JSON file is enough; the
//! `colorlab-lab` binary applies command-line overrides on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CLEANING_STATION_PORT: u16 = 5001;
pub const DEFAULT_ROBOT_ARM_PORT: u16 = 5002;
pub const DEFAULT_SIMULATION_INSTANCES: usize = 3;
pub const DEFAULT_BRIDGE_PORT: u16 = 8030;
pub const DEFAULT_ASSET_PORT: u16 = 9050;
pub const DEFAULT_SIMULATION_DEVICE_PORT: u16 = 5003;
pub const DEFAULT_CLIENT_TIMEOUT_SECS: f64 = 90.0;
pub const DEFAULT_COMPUTE_TIMEOUT_SECS: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub host: String,
    pub cleaning_station_port: u16,
    pub robot_arm_port: u16,
    pub simulation: SimulationConfig,
    pub timing: TimingConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            cleaning_station_port: DEFAULT_CLEANING_STATION_PORT,
            robot_arm_port: DEFAULT_ROBOT_ARM_PORT,
            simulation: SimulationConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl LabConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.timing.validate()
    }
}

/// Layout of the replicated simulation groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub instances: usize,
    pub base_bridge_port: u16,
    pub base_asset_port: u16,
    pub base_device_port: u16,
    pub asset_dir: PathBuf,
    pub viewer_page: String,
    pub compute_timeout_secs: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            instances: DEFAULT_SIMULATION_INSTANCES,
            base_bridge_port: DEFAULT_BRIDGE_PORT,
            base_asset_port: DEFAULT_ASSET_PORT,
            base_device_port: DEFAULT_SIMULATION_DEVICE_PORT,
            asset_dir: PathBuf::from("fluid_simulation"),
            viewer_page: "index.html".to_string(),
            compute_timeout_secs: DEFAULT_COMPUTE_TIMEOUT_SECS,
        }
    }
}

impl SimulationConfig {
    pub fn compute_timeout(&self) -> Duration {
        seconds(self.compute_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.compute_timeout_secs > 0.0 && Duration::try_from_secs_f64(self.compute_timeout_secs).is_ok()) {
            return Err(ConfigError::Invalid(format!(
                "compute_timeout_secs must be positive, got {}",
                self.compute_timeout_secs
            )));
        }
        let last = self.instances.saturating_sub(1);
        for (name, base, stride) in [
            ("base_bridge_port", self.base_bridge_port, 1),
            ("base_asset_port", self.base_asset_port, 1),
            ("base_device_port", self.base_device_port, 2),
        ] {
            if base != 0 && usize::from(base) + last * stride + (stride - 1) > usize::from(u16::MAX) {
                return Err(ConfigError::Invalid(format!(
                    "{name} {base} leaves no room for {} instances",
                    self.instances
                )));
            }
        }
        Ok(())
    }
}

/// Waits the drivers perform. `fast()` zeroes all of them for test runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub skip_cleaning_wait: bool,
    pub robot_move_secs: f64,
    pub splat_settle_secs: f64,
    pub mix_settle_secs: f64,
    pub analyze_settle_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            skip_cleaning_wait: false,
            robot_move_secs: 1.0,
            splat_settle_secs: 0.25,
            mix_settle_secs: 2.0,
            analyze_settle_secs: 2.0,
        }
    }
}

impl TimingConfig {
    pub fn fast() -> Self {
        Self {
            skip_cleaning_wait: true,
            robot_move_secs: 0.0,
            splat_settle_secs: 0.0,
            mix_settle_secs: 0.0,
            analyze_settle_secs: 0.0,
        }
    }

    pub fn robot_move(&self) -> Duration {
        seconds(self.robot_move_secs)
    }

    pub fn splat_settle(&self) -> Duration {
        seconds(self.splat_settle_secs)
    }

    pub fn mix_settle(&self) -> Duration {
        seconds(self.mix_settle_secs)
    }

    pub fn analyze_settle(&self) -> Duration {
        seconds(self.analyze_settle_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, secs) in [
            ("robot_move_secs", self.robot_move_secs),
            ("splat_settle_secs", self.splat_settle_secs),
            ("mix_settle_secs", self.mix_settle_secs),
            ("analyze_settle_secs", self.analyze_settle_secs),
        ] {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Saturating conversion for already-validated settings.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

/// Port for the `index`-th replica of a group. Base `0` keeps every replica ephemeral.
pub fn instance_port(base: u16, index: usize, stride: usize) -> u16 {
    if base == 0 {
        return 0;
    }
    u16::try_from(usize::from(base) + index * stride).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: LabConfig = serde_json::from_str(r#"{"simulation": {"instances": 1}}"#).unwrap();
        assert_eq!(config.simulation.instances, 1);
        assert_eq!(config.simulation.base_bridge_port, DEFAULT_BRIDGE_PORT);
        assert_eq!(config.cleaning_station_port, DEFAULT_CLEANING_STATION_PORT);
        assert!(!config.timing.skip_cleaning_wait);
    }

    #[test]
    fn test_instance_port() {
        assert_eq!(instance_port(8030, 2, 1), 8032);
        assert_eq!(instance_port(5003, 1, 2), 5005);
        assert_eq!(instance_port(0, 4, 2), 0);
    }

    #[test]
    fn test_port_range_overflow_rejected() {
        let mut config = LabConfig::default();
        config.simulation.base_bridge_port = u16::MAX;
        config.simulation.instances = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_timing_rejected() {
        let mut config = LabConfig::default();
        config.timing.mix_settle_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let mut config = LabConfig::default();
        config.timing.robot_move_secs = 1e20;
        assert!(config.validate().is_err());

        let mut config = LabConfig::default();
        config.simulation.compute_timeout_secs = 1e20;
        assert!(config.validate().is_err());

        let timing = TimingConfig {
            robot_move_secs: 1e20,
            ..TimingConfig::fast()
        };
        assert_eq!(timing.robot_move(), Duration::MAX);
    }
}

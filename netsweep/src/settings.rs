//! Layered settings: optional `netsweep.toml`, then `NETSWEEP__*` environment
//! variables. Command-line flags are applied on top by the binaries.

use iperf3_sweep::SweepConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base name of the settings file looked up in the working directory
pub const SETTINGS_FILE: &str = "netsweep";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Run directories are created under this directory
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Color the report when stdout is a terminal
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            color: default_color(),
        }
    }
}

impl Settings {
    /// Load from `file` if given (it must exist), else from an optional
    /// `netsweep.toml` in the working directory
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(SETTINGS_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(source)
            .add_source(config::Environment::with_prefix("NETSWEEP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn load_or_default() -> Self {
        Self::load(None).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load settings: {}. Using defaults.", e);
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iperf3_sweep::{BandwidthTarget, Protocol};
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.output.dir, PathBuf::from("results"));
        assert!(settings.output.color);
        assert_eq!(settings.sweep.port, 5201);
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[logging]
level = "debug"

[sweep]
server = "iperf.example.net"
duration_secs = 5
protocol = "tcp"
bandwidths = [500, 50, "unbounded"]

[output]
dir = "/var/tmp/sweeps"
color = false
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.sweep.server, "iperf.example.net");
        assert_eq!(settings.sweep.duration_secs, 5);
        assert_eq!(settings.sweep.port, 5201);
        assert_eq!(settings.sweep.protocol, Protocol::Tcp);
        assert_eq!(
            settings.sweep.bandwidths,
            vec![
                BandwidthTarget::Mbps(500.0),
                BandwidthTarget::Mbps(50.0),
                BandwidthTarget::Unbounded
            ]
        );
        assert_eq!(settings.output.dir, PathBuf::from("/var/tmp/sweeps"));
        assert!(!settings.output.color);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(Settings::load(Some(dir.path().join("missing.toml").as_path())).is_err());
    }
}

//! Command-line arguments of the `netsweep` binary.

use crate::settings::Settings;
use clap::Parser;
use iperf3_sweep::config::parse_bandwidth_list;
use iperf3_sweep::error::Result as SweepResult;
use iperf3_sweep::{ConfigurationError, Protocol, SweepError};
use std::path::PathBuf;

/// Invalid settings or unusable measurement tool
pub const EXIT_CONFIGURATION: u8 = 2;

/// No attempt succeeded, or the results could not be saved
pub const EXIT_NO_RESULTS: u8 = 1;

/// A second interrupt arrived while the sweep was stopping
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit status for a finished run; `Ok` carries the number of successful attempts
pub fn exit_status(outcome: &SweepResult<usize>) -> u8 {
    match outcome {
        Ok(0) => EXIT_NO_RESULTS,
        Ok(_) => 0,
        Err(SweepError::Configuration(_)) => EXIT_CONFIGURATION,
        Err(SweepError::Artifact(_)) => EXIT_NO_RESULTS,
    }
}

/// Find the highest bandwidth a path sustains without meaningful packet loss
#[derive(Parser, Debug)]
#[command(name = "netsweep", version, about)]
pub struct SweepArgs {
    /// iperf3 server address
    pub server: Option<String>,

    /// iperf3 server port [default: 5201]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds per attempt [default: 10]
    #[arg(short = 't', long = "time")]
    pub time: Option<u64>,

    /// Parallel streams per attempt [default: 1]
    #[arg(short = 'P', long)]
    pub parallel: Option<u32>,

    /// Comma-separated target rates in Mbps, highest first; "max" for unlimited
    #[arg(short, long)]
    pub bandwidths: Option<String>,

    /// Directory for run results [default: results]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Never color the report
    #[arg(long)]
    pub no_color: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Loss percentage a stable bandwidth must stay below [default: 1]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Measure with TCP instead of UDP
    #[arg(long)]
    pub tcp: bool,

    /// Seconds allowed beyond the test duration before an attempt is killed
    #[arg(long)]
    pub grace: Option<f64>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub pause: Option<f64>,

    /// Extra tries for a failed attempt
    #[arg(long)]
    pub retries: Option<u32>,

    /// Settings file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn seconds_to_ms(option: &str, secs: f64) -> Result<u64, ConfigurationError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigurationError::Settings(format!(
            "--{} must be a non-negative number of seconds, got {}",
            option, secs
        )));
    }
    Ok((secs * 1000.0).round() as u64)
}

impl SweepArgs {
    /// Override loaded settings with the flags that were given
    pub fn apply(&self, settings: &mut Settings) -> Result<(), ConfigurationError> {
        let sweep = &mut settings.sweep;
        if let Some(server) = &self.server {
            sweep.server = server.clone();
        }
        if let Some(port) = self.port {
            sweep.port = port;
        }
        if let Some(time) = self.time {
            sweep.duration_secs = time;
        }
        if let Some(parallel) = self.parallel {
            sweep.parallel = parallel;
        }
        if let Some(list) = &self.bandwidths {
            sweep.bandwidths = parse_bandwidth_list(list)?;
        }
        if let Some(threshold) = self.threshold {
            sweep.threshold_percent = threshold;
        }
        if self.tcp {
            sweep.protocol = Protocol::Tcp;
        }
        if let Some(grace) = self.grace {
            sweep.grace_ms = seconds_to_ms("grace", grace)?;
        }
        if let Some(pause) = self.pause {
            sweep.pause_ms = seconds_to_ms("pause", pause)?;
        }
        if let Some(retries) = self.retries {
            sweep.max_retries = retries;
        }

        if let Some(output) = &self.output {
            settings.output.dir = output.clone();
        }
        if self.no_color {
            settings.output.color = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iperf3_sweep::{ArtifactError, BandwidthTarget};

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&Ok(3)), 0);
        assert_eq!(exit_status(&Ok(0)), EXIT_NO_RESULTS);
        assert_eq!(
            exit_status(&Err(ConfigurationError::EmptyServer.into())),
            EXIT_CONFIGURATION
        );
        assert_eq!(
            exit_status(&Err(ArtifactError::NoFreeName("20260101_000000".to_string()).into())),
            EXIT_NO_RESULTS
        );
    }

    fn apply(args: &[&str]) -> Result<Settings, ConfigurationError> {
        let args = SweepArgs::try_parse_from(args).unwrap();
        let mut settings = Settings::default();
        args.apply(&mut settings)?;
        Ok(settings)
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = apply(&[
            "netsweep", "192.0.2.5", "-p", "5202", "-t", "5", "-P", "4", "-b", "100,max,10", "-o",
            "out", "--no-color", "--threshold", "0.5", "--tcp", "--grace", "2.5", "--pause", "0",
            "--retries", "1",
        ])
        .unwrap();

        let sweep = &settings.sweep;
        assert_eq!(sweep.server, "192.0.2.5");
        assert_eq!(sweep.port, 5202);
        assert_eq!(sweep.duration_secs, 5);
        assert_eq!(sweep.parallel, 4);
        assert_eq!(
            sweep.bandwidths,
            vec![
                BandwidthTarget::Mbps(100.0),
                BandwidthTarget::Unbounded,
                BandwidthTarget::Mbps(10.0)
            ]
        );
        assert_eq!(sweep.threshold_percent, 0.5);
        assert_eq!(sweep.protocol, Protocol::Tcp);
        assert_eq!(sweep.grace_ms, 2500);
        assert_eq!(sweep.pause_ms, 0);
        assert_eq!(sweep.max_retries, 1);
        assert_eq!(settings.output.dir, PathBuf::from("out"));
        assert!(!settings.output.color);
    }

    #[test]
    fn test_absent_flags_keep_settings() {
        let settings = apply(&["netsweep"]).unwrap();
        let defaults = Settings::default();
        assert_eq!(settings.sweep.server, "");
        assert_eq!(settings.sweep.bandwidths, defaults.sweep.bandwidths);
        assert_eq!(settings.sweep.protocol, Protocol::Udp);
        assert!(settings.output.color);
    }

    #[test]
    fn test_bad_values_are_configuration_errors() {
        assert!(matches!(
            apply(&["netsweep", "host", "-b", "100,fast"]),
            Err(ConfigurationError::InvalidBandwidth(_))
        ));
        assert!(matches!(
            apply(&["netsweep", "host", "--pause=-1"]),
            Err(ConfigurationError::Settings(_))
        ));
    }

    #[test]
    fn test_non_numeric_port_rejected_by_parser() {
        assert!(SweepArgs::try_parse_from(["netsweep", "host", "-p", "http"]).is_err());
    }
}

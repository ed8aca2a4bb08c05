//! Configuration for a bandwidth sweep.

use crate::error::ConfigurationError;
use crate::model::{AttemptRequest, BandwidthTarget, Protocol, SweepConfiguration};
use serde::{Deserialize, Serialize};

/// Default acceptance threshold for packet loss, in percent
pub const DEFAULT_LOSS_THRESHOLD_PERCENT: f64 = 1.0;

/// iperf3 refuses more parallel streams than this
pub const MAX_PARALLEL_STREAMS: u32 = 128;

/// Configuration for a sweep against one server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// iperf3 server address
    #[serde(default)]
    pub server: String,

    /// Server port (default: 5201)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Duration of each attempt in seconds
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Number of parallel streams per attempt
    #[serde(default = "default_parallel")]
    pub parallel: u32,

    /// Targets in the order they are attempted, conventionally descending
    #[serde(default = "default_bandwidths")]
    pub bandwidths: Vec<BandwidthTarget>,

    #[serde(default)]
    pub protocol: Protocol,

    /// Loss must be strictly below this for a bandwidth to count as stable
    #[serde(default = "default_threshold")]
    pub threshold_percent: f64,

    /// Added to the test duration to form each attempt's deadline
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// Pause between attempts, letting queues along the path drain
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// Extra tries for a failed attempt (0 = no retry)
    #[serde(default)]
    pub max_retries: u32,

    /// Program and leading arguments used to run iperf3
    #[serde(default = "default_tool_command")]
    pub tool_command: Vec<String>,
}

fn default_port() -> u16 {
    5201
}

fn default_duration() -> u64 {
    10
}

fn default_parallel() -> u32 {
    1
}

pub fn default_bandwidths() -> Vec<BandwidthTarget> {
    [1000.0, 500.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.0, 1.0]
        .into_iter()
        .map(BandwidthTarget::Mbps)
        .collect()
}

fn default_threshold() -> f64 {
    DEFAULT_LOSS_THRESHOLD_PERCENT
}

fn default_grace_ms() -> u64 {
    10_000
}

fn default_pause_ms() -> u64 {
    2_000
}

fn default_tool_command() -> Vec<String> {
    vec!["iperf3".to_string()]
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            duration_secs: default_duration(),
            parallel: default_parallel(),
            bandwidths: default_bandwidths(),
            protocol: Protocol::default(),
            threshold_percent: default_threshold(),
            grace_ms: default_grace_ms(),
            pause_ms: default_pause_ms(),
            max_retries: 0,
            tool_command: default_tool_command(),
        }
    }
}

impl SweepConfig {
    /// Reject inputs no measurement could succeed with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.server.trim().is_empty() {
            return Err(ConfigurationError::EmptyServer);
        }
        if self.port == 0 {
            return Err(ConfigurationError::InvalidPort(self.port));
        }
        if self.duration_secs == 0 {
            return Err(ConfigurationError::InvalidDuration(self.duration_secs));
        }
        if self.parallel == 0 || self.parallel > MAX_PARALLEL_STREAMS {
            return Err(ConfigurationError::InvalidParallel(self.parallel));
        }
        if !self.threshold_percent.is_finite()
            || self.threshold_percent <= 0.0
            || self.threshold_percent > 100.0
        {
            return Err(ConfigurationError::InvalidThreshold(self.threshold_percent));
        }
        if let Some(bad) = self.bandwidths.iter().find(|b| !b.is_valid()) {
            return Err(ConfigurationError::InvalidBandwidth(bad.to_string()));
        }
        if self.tool_command.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(ConfigurationError::EmptyToolCommand);
        }

        let descending = self
            .bandwidths
            .windows(2)
            .all(|w| w[0].ordering_key() >= w[1].ordering_key());
        if !descending {
            tracing::warn!("Bandwidth list is not in descending order; attempting it as given");
        }
        Ok(())
    }

    /// Parameters of the attempt at `target`
    pub fn attempt(&self, target: BandwidthTarget) -> AttemptRequest {
        AttemptRequest {
            server: self.server.clone(),
            port: self.port,
            duration_secs: self.duration_secs,
            parallel: self.parallel,
            target,
            protocol: self.protocol,
        }
    }

    /// The part of the configuration recorded with a result
    pub fn summary(&self) -> SweepConfiguration {
        SweepConfiguration {
            duration: self.duration_secs,
            parallel: self.parallel,
            bandwidths: self.bandwidths.clone(),
            protocol: self.protocol,
        }
    }
}

/// Parse a comma-separated list such as `"1000,500,max"`.
///
/// Repeated values are removed, keeping the first occurrence, with a
/// warning. Empty entries are ignored, so an empty string yields an empty
/// list.
pub fn parse_bandwidth_list(list: &str) -> Result<Vec<BandwidthTarget>, ConfigurationError> {
    let mut targets: Vec<BandwidthTarget> = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let target: BandwidthTarget = entry
            .parse()
            .map_err(ConfigurationError::InvalidBandwidth)?;
        if targets.contains(&target) {
            tracing::warn!("Ignoring repeated bandwidth {}", target);
            continue;
        }
        targets.push(target);
    }
    Ok(targets)
}

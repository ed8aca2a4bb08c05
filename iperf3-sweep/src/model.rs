//! Sweep data model: targets, per-attempt records and the accumulated result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rate requested from the measurement tool for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "TargetRepr", try_from = "TargetRepr")]
pub enum BandwidthTarget {
    /// Fixed rate in Mbps
    Mbps(f64),
    /// No rate limit, the tool sends as fast as it can
    Unbounded,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Rate(f64),
    Label(String),
}

const UNBOUNDED_LABEL: &str = "unbounded";

impl From<BandwidthTarget> for TargetRepr {
    fn from(target: BandwidthTarget) -> Self {
        match target {
            BandwidthTarget::Mbps(rate) => TargetRepr::Rate(rate),
            BandwidthTarget::Unbounded => TargetRepr::Label(UNBOUNDED_LABEL.to_string()),
        }
    }
}

impl TryFrom<TargetRepr> for BandwidthTarget {
    type Error = String;

    fn try_from(repr: TargetRepr) -> Result<Self, Self::Error> {
        match repr {
            TargetRepr::Rate(rate) => Ok(BandwidthTarget::Mbps(rate)),
            TargetRepr::Label(label) if label == UNBOUNDED_LABEL => Ok(BandwidthTarget::Unbounded),
            TargetRepr::Label(label) => Err(format!("unknown bandwidth target '{}'", label)),
        }
    }
}

impl BandwidthTarget {
    /// Rate in Mbps, `None` for an unbounded attempt
    pub fn mbps(self) -> Option<f64> {
        match self {
            BandwidthTarget::Mbps(rate) => Some(rate),
            BandwidthTarget::Unbounded => None,
        }
    }

    /// A fixed rate must be finite and strictly positive
    pub fn is_valid(self) -> bool {
        match self {
            BandwidthTarget::Mbps(rate) => rate.is_finite() && rate > 0.0,
            BandwidthTarget::Unbounded => true,
        }
    }

    /// Value for iperf3's `-b` option
    pub fn to_rate_arg(self) -> String {
        match self {
            BandwidthTarget::Mbps(rate) => format!("{}M", rate),
            BandwidthTarget::Unbounded => "0".to_string(),
        }
    }

    /// Sort key placing unbounded attempts above every fixed rate
    pub(crate) fn ordering_key(self) -> f64 {
        self.mbps().unwrap_or(f64::INFINITY)
    }
}

impl fmt::Display for BandwidthTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandwidthTarget::Mbps(rate) => write!(f, "{} Mbps", rate),
            BandwidthTarget::Unbounded => f.write_str(UNBOUNDED_LABEL),
        }
    }
}

impl FromStr for BandwidthTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "max" | "unbounded" => Ok(BandwidthTarget::Unbounded),
            _ => {
                let rate: f64 = s.parse().map_err(|_| s.to_string())?;
                let target = BandwidthTarget::Mbps(rate);
                if target.is_valid() {
                    Ok(target)
                } else {
                    Err(s.to_string())
                }
            }
        }
    }
}

/// Transport used for the measurement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Rate-limited datagrams; reports loss and jitter
    #[default]
    Udp,
    /// Reliable stream; no packet loss or jitter figures
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => f.write_str("UDP"),
            Protocol::Tcp => f.write_str("TCP"),
        }
    }
}

/// Delay variation of one attempt
///
/// Some tool versions and all TCP tests do not emit a jitter figure. That is
/// recorded as `NotMeasured`, which is a different statement from a measured
/// `0.0` ms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Jitter {
    Measured(f64),
    #[default]
    NotMeasured,
}

impl From<Option<f64>> for Jitter {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(ms) => Jitter::Measured(ms),
            None => Jitter::NotMeasured,
        }
    }
}

impl From<Jitter> for Option<f64> {
    fn from(jitter: Jitter) -> Self {
        jitter.value()
    }
}

impl Jitter {
    pub fn value(self) -> Option<f64> {
        match self {
            Jitter::Measured(ms) => Some(ms),
            Jitter::NotMeasured => None,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, Jitter::Measured(_))
    }
}

/// Parameters of a single tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRequest {
    pub server: String,
    pub port: u16,
    pub duration_secs: u64,
    pub parallel: u32,
    pub target: BandwidthTarget,
    pub protocol: Protocol,
}

/// Values extracted from a successful tool run
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub achieved_mbps: f64,
    pub loss_percent: f64,
    pub jitter: Jitter,
    pub duration_secs: f64,
    pub retransmits: Option<u64>,
    pub lost_packets: Option<i64>,
    pub packets: Option<u64>,
}

/// Outcome of one attempt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    target_bandwidth: BandwidthTarget,
    /// Mbps, absent when the attempt failed
    achieved_throughput: Option<f64>,
    /// Always within [0, 100] when present
    loss_percent: Option<f64>,
    #[serde(default)]
    jitter_ms: Jitter,
    duration_secs: f64,
    parallel: u32,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retransmits: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lost_packets: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    packets: Option<u64>,
}

impl MeasurementRecord {
    /// Record for an attempt that produced a measurement. Loss is clamped
    /// into [0, 100].
    pub fn measured(request: &AttemptRequest, measurement: Measurement) -> Self {
        let loss = if measurement.loss_percent.is_nan() {
            100.0
        } else {
            measurement.loss_percent.clamp(0.0, 100.0)
        };
        Self {
            target_bandwidth: request.target,
            achieved_throughput: Some(measurement.achieved_mbps),
            loss_percent: Some(loss),
            jitter_ms: measurement.jitter,
            duration_secs: measurement.duration_secs,
            parallel: request.parallel,
            success: true,
            error: None,
            retransmits: measurement.retransmits,
            lost_packets: measurement.lost_packets,
            packets: measurement.packets,
        }
    }

    /// Record for an attempt that did not produce a measurement
    pub fn failed(request: &AttemptRequest, duration_secs: f64, reason: impl Into<String>) -> Self {
        Self {
            target_bandwidth: request.target,
            achieved_throughput: None,
            loss_percent: None,
            jitter_ms: Jitter::NotMeasured,
            duration_secs,
            parallel: request.parallel,
            success: false,
            error: Some(reason.into()),
            retransmits: None,
            lost_packets: None,
            packets: None,
        }
    }

    pub fn target_bandwidth(&self) -> BandwidthTarget {
        self.target_bandwidth
    }

    pub fn achieved_throughput(&self) -> Option<f64> {
        self.achieved_throughput
    }

    pub fn loss_percent(&self) -> Option<f64> {
        self.loss_percent
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter_ms
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn parallel(&self) -> u32 {
        self.parallel
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn retransmits(&self) -> Option<u64> {
        self.retransmits
    }

    pub fn lost_packets(&self) -> Option<i64> {
        self.lost_packets
    }

    pub fn packets(&self) -> Option<u64> {
        self.packets
    }

    /// Achieved throughput as a percentage of the target rate
    pub fn achievement_percent(&self) -> Option<f64> {
        let target = self.target_bandwidth.mbps()?;
        Some(self.achieved_throughput? / target * 100.0)
    }
}

/// Sweep parameters recorded with the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfiguration {
    /// Per-attempt duration in seconds
    pub duration: u64,
    pub parallel: u32,
    pub bandwidths: Vec<BandwidthTarget>,
    #[serde(default)]
    pub protocol: Protocol,
}

/// Ordered attempts of one sweep plus run metadata
///
/// Attempts are appended by the sweep controller only, in the configured
/// bandwidth order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub run_id: Uuid,
    pub server: String,
    pub port: u16,
    pub timestamp: DateTime<Utc>,
    pub configuration: SweepConfiguration,
    /// The sweep was interrupted before every target was attempted
    #[serde(default)]
    pub cancelled: bool,
    attempts: Vec<MeasurementRecord>,
}

impl SweepResult {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        timestamp: DateTime<Utc>,
        configuration: SweepConfiguration,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            server: server.into(),
            port,
            timestamp,
            configuration,
            cancelled: false,
            attempts: Vec::new(),
        }
    }

    pub fn attempts(&self) -> &[MeasurementRecord] {
        &self.attempts
    }

    pub fn successful(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.attempts.iter().filter(|r| r.success())
    }

    pub fn success_count(&self) -> usize {
        self.successful().count()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub(crate) fn push(&mut self, record: MeasurementRecord) {
        self.attempts.push(record);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }
}

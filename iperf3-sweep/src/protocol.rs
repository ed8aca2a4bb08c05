//! iperf3 client JSON output (`-J`).
//!
//! The layout of the `end` section differs between iperf3 releases and test
//! modes:
//!
//! - TCP tests report `sum_sent` and `sum_received`.
//! - UDP tests on older releases report a single `sum` carrying `jitter_ms`,
//!   `lost_packets`, `packets` and `lost_percent`.
//! - UDP tests on 3.x releases since 3.10 additionally report `sum_sent` and
//!   `sum_received`, where only the receiver side carries jitter.
//!
//! Every field is therefore optional here; deciding what is required happens
//! in [`crate::parser`].

use serde::Deserialize;

/// Top-level document printed by `iperf3 -c ... -J`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientReport {
    #[serde(default)]
    pub start: Option<StartInfo>,

    #[serde(default)]
    pub end: Option<EndInfo>,

    /// Set when the run failed, e.g. "unable to connect to server"
    #[serde(default)]
    pub error: Option<String>,
}

/// Start information
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartInfo {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub test_start: Option<TestStartInfo>,
}

/// Test start parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestStartInfo {
    /// "TCP" or "UDP"
    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub num_streams: Option<u32>,

    #[serde(default)]
    pub duration: Option<u64>,
}

/// End (final) results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndInfo {
    #[serde(default)]
    pub sum_sent: Option<StreamSummary>,

    #[serde(default)]
    pub sum_received: Option<StreamSummary>,

    /// UDP summary on older releases
    #[serde(default)]
    pub sum: Option<StreamSummary>,
}

/// Aggregate over all streams in one direction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamSummary {
    #[serde(default)]
    pub seconds: Option<f64>,

    #[serde(default)]
    pub bytes: Option<u64>,

    #[serde(default)]
    pub bits_per_second: Option<f64>,

    /// TCP only
    #[serde(default)]
    pub retransmits: Option<u64>,

    /// UDP only
    #[serde(default)]
    pub jitter_ms: Option<f64>,

    /// UDP only; iperf3 reports negative values when packets arrive out of order
    #[serde(default)]
    pub lost_packets: Option<i64>,

    /// UDP only
    #[serde(default)]
    pub packets: Option<u64>,

    /// UDP only
    #[serde(default)]
    pub lost_percent: Option<f64>,
}

impl StreamSummary {
    /// Loss derived from the packet counters when `lost_percent` is absent
    pub fn loss_percent(&self) -> Option<f64> {
        if let Some(percent) = self.lost_percent {
            return Some(percent);
        }
        match (self.lost_packets, self.packets) {
            (Some(lost), Some(total)) if total > 0 => Some(lost as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

impl EndInfo {
    /// Summaries in order of preference: what the receiver saw first
    pub fn summaries(&self) -> impl Iterator<Item = &StreamSummary> {
        [&self.sum_received, &self.sum, &self.sum_sent]
            .into_iter()
            .filter_map(|s| s.as_ref())
    }
}

impl ClientReport {
    /// Protocol announced in `start.test_start`, if any
    pub fn protocol(&self) -> Option<&str> {
        self.start
            .as_ref()?
            .test_start
            .as_ref()?
            .protocol
            .as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.start.as_ref()?.version.as_deref()
    }
}

//! Selection of the highest stable bandwidth from a finished sweep.

use crate::config::DEFAULT_LOSS_THRESHOLD_PERCENT;
use crate::model::{BandwidthTarget, MeasurementRecord, SweepResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the sweep was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictStatus {
    MetThreshold,
    NoBandwidthMetThreshold,
    InsufficientData,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictStatus::MetThreshold => "met-threshold",
            VerdictStatus::NoBandwidthMetThreshold => "no-bandwidth-met-threshold",
            VerdictStatus::InsufficientData => "insufficient-data",
        };
        f.write_str(s)
    }
}

/// Lowest-loss attempt, reported when nothing met the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub target_bandwidth: BandwidthTarget,
    pub loss_percent: f64,
}

/// Result of the stability analysis. Always derived from a [`SweepResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityVerdict {
    /// Highest target rate (Mbps) with loss below the threshold
    pub best_bandwidth: Option<f64>,
    pub loss_at_best: Option<f64>,
    pub status: VerdictStatus,
    pub threshold_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
}

/// Picks the highest bandwidth whose loss is strictly below a threshold
#[derive(Debug, Clone, Copy)]
pub struct StabilityAnalyzer {
    threshold_percent: f64,
}

impl Default for StabilityAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_LOSS_THRESHOLD_PERCENT)
    }
}

impl StabilityAnalyzer {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// Judge a finished sweep. Pure; nothing is re-measured.
    pub fn analyze(&self, result: &SweepResult) -> StabilityVerdict {
        let mut verdict = StabilityVerdict {
            best_bandwidth: None,
            loss_at_best: None,
            status: VerdictStatus::InsufficientData,
            threshold_percent: self.threshold_percent,
            fallback: None,
        };
        if result.is_empty() {
            return verdict;
        }

        // Highest target first; the sort is stable so repeated targets keep
        // their sweep order.
        let mut measured: Vec<(&MeasurementRecord, f64)> = result
            .successful()
            .filter_map(|r| r.loss_percent().map(|loss| (r, loss)))
            .collect();
        measured.sort_by(|a, b| {
            b.0.target_bandwidth()
                .ordering_key()
                .total_cmp(&a.0.target_bandwidth().ordering_key())
        });

        let best = measured.iter().find_map(|&(record, loss)| {
            let rate = record.target_bandwidth().mbps()?;
            (loss < self.threshold_percent).then_some((rate, loss))
        });

        match best {
            Some((rate, loss)) => {
                verdict.best_bandwidth = Some(rate);
                verdict.loss_at_best = Some(loss);
                verdict.status = VerdictStatus::MetThreshold;
            }
            None => {
                verdict.status = VerdictStatus::NoBandwidthMetThreshold;
                verdict.fallback = measured
                    .iter()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|&(record, loss)| Fallback {
                        target_bandwidth: record.target_bandwidth(),
                        loss_percent: loss,
                    });
            }
        }
        verdict
    }
}

//! Reduction of a parsed log to summary statistics.

use crate::parser::{PingLog, Reply};
use serde::Serialize;

/// Missing sequence numbers kept individually; the rest are only counted
pub const MAX_LISTED_MISSING: usize = 10;

/// Summary of one ping log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingStats {
    pub received: u64,
    pub sent: u64,
    /// `1 - received / sent`, in percent
    pub loss_percent: f64,
    pub rtt_min: Option<f64>,
    pub rtt_avg: Option<f64>,
    pub rtt_max: Option<f64>,
    /// Population standard deviation, as `ping` prints it
    pub rtt_mdev: Option<f64>,
    pub rtt_median: Option<f64>,
    /// Sample standard deviation
    pub rtt_stddev: Option<f64>,
    /// Mean absolute difference between consecutive replies
    pub jitter: Option<f64>,
    /// Reply-shaped lines that could not be parsed
    pub skipped: usize,
    pub duplicates: usize,
    /// Sequence numbers between the lowest and highest reply with no reply
    pub missing_count: u64,
    /// The lowest missing sequence numbers, at most [`MAX_LISTED_MISSING`]
    pub missing: Vec<u64>,
    /// Replies slower than avg + 2 * stddev, in log order
    pub spikes: Vec<Reply>,
}

/// Gaps in the observed sequence range
struct SequenceGaps {
    /// `highest - lowest + 1`, saturating at `u64::MAX`
    span: u64,
    count: u64,
    listed: Vec<u64>,
}

impl SequenceGaps {
    fn new(log: &PingLog) -> Self {
        let mut seqs: Vec<u64> = log.replies.iter().map(|r| r.seq).collect();
        seqs.sort_unstable();
        seqs.dedup();

        let span = match (seqs.first(), seqs.last()) {
            (Some(lowest), Some(highest)) => (highest - lowest).saturating_add(1),
            _ => 0,
        };

        let mut listed = Vec::new();
        for pair in seqs.windows(2) {
            if listed.len() == MAX_LISTED_MISSING {
                break;
            }
            let room = MAX_LISTED_MISSING - listed.len();
            listed.extend((pair[0] + 1..pair[1]).take(room));
        }

        Self {
            span,
            count: span.saturating_sub(seqs.len() as u64),
            listed,
        }
    }
}

impl PingStats {
    pub fn from_log(log: &PingLog) -> Self {
        let rtts = log.rtts();
        let gaps = SequenceGaps::new(log);

        let received = match (log.replies.len(), log.summary) {
            (0, Some(summary)) => summary.received,
            (n, _) => n as u64,
        };
        // Without a summary, a log that starts mid-stream counts from its first reply
        let sent = match log.summary {
            Some(summary) => summary.transmitted,
            None => gaps.span,
        }
        .max(received);

        let loss_percent = if sent == 0 {
            0.0
        } else {
            (1.0 - received as f64 / sent as f64) * 100.0
        };

        let rtt_avg = common::mean(&rtts);
        let rtt_stddev = common::sample_std_dev(&rtts);
        let spikes = match rtt_avg {
            Some(avg) => {
                let threshold = avg + 2.0 * rtt_stddev.unwrap_or(0.0);
                log.replies
                    .iter()
                    .filter(|r| r.rtt_ms > threshold)
                    .copied()
                    .collect()
            }
            None => Vec::new(),
        };

        Self {
            received,
            sent,
            loss_percent,
            rtt_min: rtts.iter().copied().min_by(f64::total_cmp),
            rtt_avg,
            rtt_max: rtts.iter().copied().max_by(f64::total_cmp),
            rtt_mdev: common::population_std_dev(&rtts),
            rtt_median: common::median(&rtts),
            rtt_stddev,
            jitter: common::mean_consecutive_delta(&rtts),
            skipped: log.skipped,
            duplicates: log.duplicates,
            missing_count: gaps.count,
            missing: gaps.listed,
            spikes,
        }
    }
}

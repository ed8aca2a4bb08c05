//! Line classification for ping output.
//!
//! Recognised lines:
//!
//! ```text
//! 64 bytes from 192.0.2.1: icmp_seq=3 ttl=57 time=11.4 ms
//! 64 bytes from 192.0.2.1: icmp_seq=3 ttl=57 time=11.9 ms (DUP!)
//! 10 packets transmitted, 8 received, 20% packet loss, time 9012ms
//! ```
//!
//! Everything else (the banner, "Destination Host Unreachable", the rtt
//! summary) is ignored.

use crate::error::{PingLogError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// One echo reply
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reply {
    pub seq: u64,
    pub rtt_ms: f64,
}

/// Transmitted/received counts from the trailing summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub transmitted: u64,
    pub received: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Reply { reply: Reply, duplicate: bool },
    Summary(Summary),
    /// Reply-shaped line whose numbers do not parse
    Malformed,
    Other,
}

/// Parsed content of a log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingLog {
    /// First reply per sequence number, in log order
    pub replies: Vec<Reply>,
    pub duplicates: usize,
    pub skipped: usize,
    pub summary: Option<Summary>,
}

impl PingLog {
    pub fn has_data(&self) -> bool {
        !self.replies.is_empty() || self.summary.is_some()
    }

    pub fn rtts(&self) -> Vec<f64> {
        self.replies.iter().map(|r| r.rtt_ms).collect()
    }
}

pub struct PingLogParser {
    reply: Regex,
    summary: Regex,
}

impl PingLogParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            reply: Regex::new(r"icmp_[sr]eq=(\S+)\s.*?time[=<](\S+?)\s*ms")?,
            summary: Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")?,
        })
    }

    pub fn classify(&self, line: &str) -> LineKind {
        if let Some(caps) = self.reply.captures(line) {
            let seq = caps[1].parse::<u64>();
            let rtt = caps[2].parse::<f64>();
            return match (seq, rtt) {
                (Ok(seq), Ok(rtt_ms)) if rtt_ms.is_finite() && rtt_ms >= 0.0 => LineKind::Reply {
                    reply: Reply { seq, rtt_ms },
                    duplicate: line.contains("DUP!"),
                },
                _ => LineKind::Malformed,
            };
        }
        if let Some(caps) = self.summary.captures(line) {
            if let (Ok(transmitted), Ok(received)) = (caps[1].parse(), caps[2].parse()) {
                return LineKind::Summary(Summary {
                    transmitted,
                    received,
                });
            }
        }
        LineKind::Other
    }

    pub fn parse_str(&self, text: &str) -> PingLog {
        let mut log = PingLog::default();
        let mut seen = HashSet::new();

        for (lineno, line) in text.lines().enumerate() {
            match self.classify(line) {
                LineKind::Reply { reply, duplicate } => {
                    if seen.insert(reply.seq) {
                        log.replies.push(reply);
                    } else {
                        if !duplicate {
                            tracing::debug!("Line {}: repeated icmp_seq={}", lineno + 1, reply.seq);
                        }
                        log.duplicates += 1;
                    }
                }
                LineKind::Summary(summary) => log.summary = Some(summary),
                LineKind::Malformed => {
                    tracing::debug!("Line {}: skipping malformed reply: {}", lineno + 1, line.trim());
                    log.skipped += 1;
                }
                LineKind::Other => {}
            }
        }
        log
    }

    /// Read and parse a log file
    pub fn parse_file(&self, path: &Path) -> Result<PingLog> {
        let text = std::fs::read_to_string(path).map_err(|source| PingLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(PingLogError::EmptyInput {
                path: path.to_path_buf(),
            });
        }

        let log = self.parse_str(&text);
        if !log.has_data() {
            return Err(PingLogError::NoData {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(
            "Parsed {} replies ({} duplicate, {} skipped) from {}",
            log.replies.len(),
            log.duplicates,
            log.skipped,
            path.display()
        );
        Ok(log)
    }
}

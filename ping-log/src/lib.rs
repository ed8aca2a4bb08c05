//! # ping-log
//!
//! Summary statistics from saved `ping` output: loss, round-trip time
//! min/avg/max/mdev, jitter and latency spikes.
//!
//! ```no_run
//! use ping_log::{analyze_file, render_summary};
//! use std::path::Path;
//!
//! let path = Path::new("ping.log");
//! let (_, stats) = analyze_file(path).unwrap();
//! print!("{}", render_summary(path, &stats));
//! ```

pub mod error;
pub mod parser;
pub mod report;
pub mod stats;

pub use error::{PingLogError, Result};
pub use parser::{LineKind, PingLog, PingLogParser, Reply, Summary};
pub use report::{print_summary, render_summary, rtt_chart, spike_table, write_rtt_chart};
pub use stats::{PingStats, MAX_LISTED_MISSING};

use std::path::Path;

/// Parse the log at `path` and compute its statistics
pub fn analyze_file(path: &Path) -> Result<(PingLog, PingStats)> {
    let log = PingLogParser::new()?.parse_file(path)?;
    let stats = PingStats::from_log(&log);
    Ok((log, stats))
}

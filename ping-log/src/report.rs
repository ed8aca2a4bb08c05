//! Text summary and RTT chart.

use crate::error::{PingLogError, Result};
use crate::parser::PingLog;
use crate::stats::PingStats;
use common::{LineChart, Series};
use prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE;
use prettytable::{Cell, Row, Table};
use std::fmt::Write;
use std::path::Path;

/// Spikes listed individually before the rest are summarised
const MAX_LISTED: usize = 10;

fn ms(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3} ms", v),
        None => "n/a".to_string(),
    }
}

/// Everything above the spike table
fn overview(source: &Path, stats: &PingStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ping log analysis: {}", source.display());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Packets: {} sent, {} received, {:.2}% loss",
        stats.sent, stats.received, stats.loss_percent
    );
    if stats.duplicates > 0 {
        let _ = writeln!(out, "Duplicate replies: {}", stats.duplicates);
    }
    if stats.skipped > 0 {
        let _ = writeln!(out, "Unparseable reply lines skipped: {}", stats.skipped);
    }
    if stats.missing_count > 0 {
        let listed: Vec<String> = stats.missing.iter().map(u64::to_string).collect();
        let more = stats.missing_count.saturating_sub(stats.missing.len() as u64);
        let _ = writeln!(
            out,
            "Missing sequence numbers: {}{}",
            listed.join(", "),
            if more > 0 {
                format!(" and {} more", more)
            } else {
                String::new()
            }
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Round-trip time:");
    let _ = writeln!(out, "  min:     {}", ms(stats.rtt_min));
    let _ = writeln!(out, "  avg:     {}", ms(stats.rtt_avg));
    let _ = writeln!(out, "  max:     {}", ms(stats.rtt_max));
    let _ = writeln!(out, "  mdev:    {}", ms(stats.rtt_mdev));
    let _ = writeln!(out, "  median:  {}", ms(stats.rtt_median));
    let _ = writeln!(out, "  stddev:  {}", ms(stats.rtt_stddev));
    let _ = writeln!(out, "  jitter:  {}", ms(stats.jitter));
    let _ = writeln!(out);

    if stats.spikes.is_empty() {
        let _ = writeln!(out, "No latency spikes detected");
    } else {
        let _ = writeln!(out, "Latency spikes (above avg + 2 stddev): {}", stats.spikes.len());
    }
    out
}

fn spikes_remainder(stats: &PingStats) -> String {
    match stats.spikes.len().saturating_sub(MAX_LISTED) {
        0 => String::new(),
        more => format!("  ... and {} more\n", more),
    }
}

/// The first spikes, one row each; styles apply only when printed to a tty
pub fn spike_table(stats: &PingStats) -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(vec![
        Cell::new("icmp_seq").style_spec("b"),
        Cell::new("RTT").style_spec("b"),
    ]));
    for spike in stats.spikes.iter().take(MAX_LISTED) {
        table.add_row(Row::new(vec![
            Cell::new(&spike.seq.to_string()).style_spec("r"),
            Cell::new(&format!("{:.3} ms", spike.rtt_ms)).style_spec("Frr"),
        ]));
    }
    table
}

/// Multi-line summary of `stats` for `source`, without color
pub fn render_summary(source: &Path, stats: &PingStats) -> String {
    let mut out = overview(source, stats);
    if !stats.spikes.is_empty() {
        out.push_str(&spike_table(stats).to_string());
        out.push_str(&spikes_remainder(stats));
    }
    out
}

/// Print the summary to stdout; `color` should only be set for a terminal
pub fn print_summary(source: &Path, stats: &PingStats, color: bool) {
    print!("{}", overview(source, stats));
    if stats.spikes.is_empty() {
        return;
    }
    let table = spike_table(stats);
    if color {
        if let Err(e) = table.print_tty(true) {
            tracing::debug!("Colored output failed, falling back to plain: {}", e);
            print!("{}", table);
        }
    } else {
        print!("{}", table);
    }
    print!("{}", spikes_remainder(stats));
}

/// RTT by sequence number as an SVG document
pub fn rtt_chart(log: &PingLog) -> Result<String> {
    let points = log.replies.iter().map(|r| (r.seq as f64, r.rtt_ms));
    Ok(LineChart::new("Round-trip time by sequence number")
        .x_label("icmp_seq")
        .y_label("RTT (ms)")
        .size(1000, 480)
        .series(Series::new("RTT", "#1f77b4").with_points(points))
        .render()?)
}

/// Render the RTT chart and write it to `path`
pub fn write_rtt_chart(log: &PingLog, path: &Path) -> Result<()> {
    let svg = rtt_chart(log)?;
    std::fs::write(path, svg).map_err(|source| PingLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Chart saved to {}", path.display());
    Ok(())
}

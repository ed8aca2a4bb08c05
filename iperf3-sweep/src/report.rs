//! Human-readable sweep report.

use crate::model::{MeasurementRecord, SweepResult};
use crate::stability::{StabilityVerdict, VerdictStatus};
use prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE;
use prettytable::{Cell, Row, Table};
use std::fmt::Write;

/// Aggregate figures shown under the table
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub attempts: usize,
    pub successful: usize,
    /// Percentage of attempts that produced a measurement
    pub success_rate: Option<f64>,
    /// Highest achieved throughput over all attempts, Mbps
    pub best_achieved: Option<f64>,
    /// Mean over attempts that measured jitter
    pub average_jitter: Option<f64>,
    pub jitter_samples: usize,
    pub average_achievement: Option<f64>,
}

impl ReportSummary {
    pub fn from_result(result: &SweepResult) -> Self {
        let attempts = result.attempts().len();
        let successful = result.success_count();

        let jitters: Vec<f64> = result.successful().filter_map(|r| r.jitter().value()).collect();
        let achievements: Vec<f64> = result
            .successful()
            .filter_map(MeasurementRecord::achievement_percent)
            .collect();

        Self {
            attempts,
            successful,
            success_rate: (attempts > 0).then(|| successful as f64 / attempts as f64 * 100.0),
            best_achieved: result
                .successful()
                .filter_map(MeasurementRecord::achieved_throughput)
                .max_by(f64::total_cmp),
            average_jitter: common::mean(&jitters),
            jitter_samples: jitters.len(),
            average_achievement: common::mean(&achievements),
        }
    }
}

/// Formats a sweep and its verdict
#[derive(Debug, Clone, Copy)]
pub struct ReportGenerator {
    color: bool,
}

impl ReportGenerator {
    /// `color` should only be set when stdout is a terminal
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Attempt table, one row per attempt in sweep order
    pub fn table(&self, result: &SweepResult, verdict: &StabilityVerdict) -> Table {
        let mut table = Table::new();
        table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(
            ["Target", "Achieved", "Achievement", "Loss", "Jitter", "Status"]
                .into_iter()
                .map(|title| Cell::new(title).style_spec("b"))
                .collect(),
        ));

        for record in result.attempts() {
            let (status, style) = row_status(record, verdict.threshold_percent);
            let cell = |text: String, spec: &str| {
                let cell = Cell::new(&text);
                if self.color {
                    cell.style_spec(spec)
                } else {
                    cell
                }
            };
            table.add_row(Row::new(vec![
                Cell::new(&record.target_bandwidth().to_string()),
                cell(or_dash(record.achieved_throughput().map(|v| format!("{:.2} Mbps", v))), "r"),
                cell(or_dash(record.achievement_percent().map(|v| format!("{:.1}%", v))), "r"),
                cell(or_dash(record.loss_percent().map(|v| format!("{:.2}%", v))), "r"),
                cell(
                    match record.jitter().value() {
                        Some(ms) => format!("{:.3} ms", ms),
                        None if record.success() => "n/a".to_string(),
                        None => "-".to_string(),
                    },
                    "r",
                ),
                cell(status.to_string(), style),
            ]));
        }
        table
    }

    /// Plain-text report; identical output for identical input
    pub fn render(&self, result: &SweepResult, verdict: &StabilityVerdict) -> String {
        let mut out = header(result);
        if !result.is_empty() {
            out.push_str(&self.table(result, verdict).to_string());
        }
        out.push_str(&footer(result, verdict));
        out
    }

    /// Print the report to stdout, colored if enabled
    pub fn print(&self, result: &SweepResult, verdict: &StabilityVerdict) {
        print!("{}", header(result));
        if !result.is_empty() {
            let table = self.table(result, verdict);
            if self.color {
                if let Err(e) = table.print_tty(true) {
                    tracing::debug!("Colored output failed, falling back to plain: {}", e);
                    print!("{}", table);
                }
            } else {
                print!("{}", table);
            }
        }
        print!("{}", footer(result, verdict));
    }
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

fn row_status(record: &MeasurementRecord, threshold: f64) -> (&'static str, &'static str) {
    match record.loss_percent() {
        _ if !record.success() => ("failed", "Fr"),
        Some(loss) if loss < threshold => ("stable", "Fg"),
        _ => ("unstable", "Fy"),
    }
}

fn header(result: &SweepResult) -> String {
    let config = &result.configuration;
    let mut out = String::new();
    let _ = writeln!(out, "Network bandwidth sweep report");
    let _ = writeln!(out, "==============================");
    let _ = writeln!(out, "Server:    {}:{}", result.server, result.port);
    let _ = writeln!(out, "Started:   {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(
        out,
        "Settings:  {}, {} s per attempt, {} stream(s)",
        config.protocol, config.duration, config.parallel
    );
    let _ = writeln!(out, "Run:       {}", result.run_id);
    if result.cancelled {
        let _ = writeln!(out, "Note:      sweep was interrupted; only completed attempts are shown");
    }
    out.push('\n');
    out
}

fn footer(result: &SweepResult, verdict: &StabilityVerdict) -> String {
    let summary = ReportSummary::from_result(result);
    let mut out = String::from("\n");

    if result.is_empty() {
        let _ = writeln!(out, "No attempts were made: insufficient data to judge stability.");
        return out;
    }

    let failures: Vec<_> = result.attempts().iter().filter(|r| !r.success()).collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for record in failures {
            let _ = writeln!(
                out,
                "  {}: {}",
                record.target_bandwidth(),
                record.error().unwrap_or("unknown error")
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(
        out,
        "  Attempts:            {} ({} successful, {})",
        summary.attempts,
        summary.successful,
        summary
            .success_rate
            .map(|rate| format!("{:.1}%", rate))
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "  Best achieved:       {}",
        summary
            .best_achieved
            .map(|v| format!("{:.2} Mbps", v))
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "  Average jitter:      {}",
        match summary.average_jitter {
            Some(ms) => format!("{:.3} ms over {} attempt(s)", ms, summary.jitter_samples),
            None => "n/a".to_string(),
        }
    );
    let _ = writeln!(
        out,
        "  Average achievement: {}",
        summary
            .average_achievement
            .map(|v| format!("{:.1}%", v))
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  Verdict:             {}", describe_verdict(verdict));
    out
}

/// One-line description of a verdict
pub fn describe_verdict(verdict: &StabilityVerdict) -> String {
    match verdict.status {
        VerdictStatus::MetThreshold => format!(
            "highest stable bandwidth {} Mbps (loss {:.2}% < {}%)",
            verdict.best_bandwidth.unwrap_or_default(),
            verdict.loss_at_best.unwrap_or_default(),
            verdict.threshold_percent
        ),
        VerdictStatus::NoBandwidthMetThreshold => match &verdict.fallback {
            Some(fallback) => format!(
                "no bandwidth kept loss below {}%; lowest loss was {:.2}% at {}",
                verdict.threshold_percent, fallback.loss_percent, fallback.target_bandwidth
            ),
            None => format!(
                "no bandwidth kept loss below {}%; no attempt succeeded",
                verdict.threshold_percent
            ),
        },
        VerdictStatus::InsufficientData => "insufficient data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{failed, measured, sweep};
    use crate::model::Jitter;
    use crate::stability::StabilityAnalyzer;

    fn scenario() -> (SweepResult, StabilityVerdict) {
        let result = sweep(vec![
            failed(200.0),
            measured(100.0, 96.0, 2.0, Jitter::Measured(0.2)),
            measured(50.0, 49.0, 0.5, Jitter::NotMeasured),
            measured(20.0, 20.0, 0.0, Jitter::Measured(0.1)),
        ]);
        let verdict = StabilityAnalyzer::default().analyze(&result);
        (result, verdict)
    }

    #[test]
    fn test_render_is_deterministic() {
        let (result, verdict) = scenario();
        let generator = ReportGenerator::new(false);
        assert_eq!(generator.render(&result, &verdict), generator.render(&result, &verdict));
        assert_eq!(
            generator.table(&result, &verdict).to_string(),
            ReportGenerator::new(true).table(&result, &verdict).to_string()
        );
    }

    #[test]
    fn test_render_contents() {
        let (result, verdict) = scenario();
        let text = ReportGenerator::new(false).render(&result, &verdict);

        assert!(text.contains("192.0.2.10:5201"));
        assert!(text.contains("2024-05-01 12:30:00 UTC"));
        assert!(text.contains("96.00 Mbps"));
        assert!(text.contains("n/a"));
        assert!(text.contains("unstable"));
        assert!(text.contains("failed"));
        assert!(text.contains("200 Mbps: unable to connect to server"));
        assert!(text.contains("3 successful, 75.0%"));
        assert!(text.contains("0.150 ms over 2 attempt(s)"));
        assert!(text.contains("highest stable bandwidth 50 Mbps"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_rows_follow_sweep_order() {
        let (result, verdict) = scenario();
        let text = ReportGenerator::new(false).table(&result, &verdict).to_string();
        let first = text.find("200 Mbps").unwrap();
        let last = text.find("20 Mbps ").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_empty_sweep_report() {
        let result = sweep(vec![]);
        let verdict = StabilityAnalyzer::default().analyze(&result);
        let text = ReportGenerator::new(false).render(&result, &verdict);
        assert!(text.contains("insufficient data"));
        assert_eq!(describe_verdict(&verdict), "insufficient data");
    }

    #[test]
    fn test_summary_ignores_unmeasured_jitter() {
        let (result, _) = scenario();
        let summary = ReportSummary::from_result(&result);
        assert_eq!(summary.jitter_samples, 2);
        assert!((summary.average_jitter.unwrap() - 0.15).abs() < 1e-9);
        assert_eq!(summary.best_achieved, Some(96.0));
        assert_eq!(summary.success_rate, Some(75.0));
    }

    #[test]
    fn test_verdict_fallback_description() {
        let result = sweep(vec![measured(10.0, 5.0, 40.0, Jitter::Measured(1.0))]);
        let verdict = StabilityAnalyzer::default().analyze(&result);
        assert_eq!(
            describe_verdict(&verdict),
            "no bandwidth kept loss below 1%; lowest loss was 40.00% at 10 Mbps"
        );
    }
}

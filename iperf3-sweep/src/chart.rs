//! SVG charts of a sweep: loss, jitter and throughput against target rate.
//!
//! Only successful fixed-rate attempts are plotted; an unbounded attempt has
//! no position on the bandwidth axis. Chart failures are never fatal to a
//! run: [`ChartGenerator::render_all`] logs them and carries on.

use crate::error::ChartRenderError;
use crate::model::{MeasurementRecord, SweepResult};
use common::{LineChart, Scale, Series};
use std::fs;
use std::path::{Path, PathBuf};

pub const LOSS_CHART_FILE_NAME: &str = "loss.svg";
pub const JITTER_CHART_FILE_NAME: &str = "jitter.svg";
pub const THROUGHPUT_CHART_FILE_NAME: &str = "throughput.svg";

const BANDWIDTH_AXIS: &str = "Target bandwidth (Mbps)";

/// Renders the charts of one sweep
#[derive(Debug, Clone, Default)]
pub struct ChartGenerator;

impl ChartGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Packet loss against target bandwidth
    pub fn loss_chart(&self, result: &SweepResult) -> Result<String, ChartRenderError> {
        let points = plotted(result, MeasurementRecord::loss_percent);
        if points.is_empty() {
            return Err(ChartRenderError::NoData("loss"));
        }
        Ok(LineChart::new("Packet loss vs target bandwidth")
            .x_label(BANDWIDTH_AXIS)
            .y_label("Loss (%)")
            .x_scale(Scale::Log10)
            .series(Series::new("Loss", "#d62728").with_points(points))
            .render()?)
    }

    /// Jitter against target bandwidth, omitting attempts without a jitter figure
    pub fn jitter_chart(&self, result: &SweepResult) -> Result<String, ChartRenderError> {
        let points = plotted(result, |r| r.jitter().value());
        if points.is_empty() {
            return Err(ChartRenderError::NoData("jitter"));
        }
        Ok(LineChart::new("Jitter vs target bandwidth")
            .x_label(BANDWIDTH_AXIS)
            .y_label("Jitter (ms)")
            .x_scale(Scale::Log10)
            .series(Series::new("Jitter", "#1f77b4").with_points(points))
            .render()?)
    }

    /// Achieved throughput against target, with the ideal line for reference
    pub fn throughput_chart(&self, result: &SweepResult) -> Result<String, ChartRenderError> {
        let achieved = plotted(result, MeasurementRecord::achieved_throughput);
        if achieved.is_empty() {
            return Err(ChartRenderError::NoData("throughput"));
        }
        let ideal: Vec<_> = achieved.iter().map(|&(x, _)| (x, x)).collect();
        Ok(LineChart::new("Achieved vs target bandwidth")
            .x_label(BANDWIDTH_AXIS)
            .y_label("Throughput (Mbps)")
            .x_scale(Scale::Log10)
            .series(Series::new("Target", "#7f7f7f").with_points(ideal))
            .series(Series::new("Achieved", "#2ca02c").with_points(achieved))
            .render()?)
    }

    /// Write every chart that can be drawn into `dir`, returning the files
    /// written. Failures are logged as warnings.
    pub fn render_all(&self, result: &SweepResult, dir: &Path) -> Vec<PathBuf> {
        let charts: [(&str, Result<String, ChartRenderError>); 3] = [
            (LOSS_CHART_FILE_NAME, self.loss_chart(result)),
            (JITTER_CHART_FILE_NAME, self.jitter_chart(result)),
            (THROUGHPUT_CHART_FILE_NAME, self.throughput_chart(result)),
        ];

        let mut written = Vec::new();
        for (name, chart) in charts {
            let path = dir.join(name);
            match chart.and_then(|svg| write_chart(&path, &svg)) {
                Ok(()) => {
                    tracing::info!("Chart saved to {}", path.display());
                    written.push(path);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", name, e),
            }
        }
        written
    }
}

fn write_chart(path: &Path, svg: &str) -> Result<(), ChartRenderError> {
    fs::write(path, svg).map_err(|source| ChartRenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// (target Mbps, value) for successful fixed-rate attempts, ascending by target
fn plotted<F>(result: &SweepResult, value: F) -> Vec<(f64, f64)>
where
    F: Fn(&MeasurementRecord) -> Option<f64>,
{
    let mut points: Vec<(f64, f64)> = result
        .successful()
        .filter_map(|r| Some((r.target_bandwidth().mbps()?, value(r)?)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{failed, measured, sweep};
    use crate::model::Jitter;
    use tempfile::TempDir;

    #[test]
    fn test_jitter_chart_omits_unmeasured_points() {
        let result = sweep(vec![
            measured(100.0, 90.0, 3.0, Jitter::Measured(0.4)),
            measured(50.0, 49.0, 0.0, Jitter::NotMeasured),
            measured(10.0, 10.0, 0.0, Jitter::Measured(0.1)),
        ]);
        let points = plotted(&result, |r| r.jitter().value());
        assert_eq!(points, vec![(10.0, 0.1), (100.0, 0.4)]);
        assert!(ChartGenerator::new().jitter_chart(&result).is_ok());
    }

    #[test]
    fn test_failed_attempts_not_plotted() {
        let result = sweep(vec![failed(100.0), measured(10.0, 9.0, 1.5, Jitter::NotMeasured)]);
        assert_eq!(plotted(&result, MeasurementRecord::loss_percent), vec![(10.0, 1.5)]);
    }

    #[test]
    fn test_no_data() {
        let result = sweep(vec![failed(100.0)]);
        let charts = ChartGenerator::new();
        assert!(matches!(charts.loss_chart(&result), Err(ChartRenderError::NoData("loss"))));
        assert!(matches!(
            charts.jitter_chart(&result),
            Err(ChartRenderError::NoData("jitter"))
        ));
    }

    #[test]
    fn test_render_all_writes_what_it_can() {
        let dir = TempDir::new().unwrap();
        let result = sweep(vec![
            measured(100.0, 90.0, 3.0, Jitter::NotMeasured),
            measured(10.0, 10.0, 0.0, Jitter::NotMeasured),
        ]);

        let written = ChartGenerator::new().render_all(&result, dir.path());
        assert_eq!(
            written,
            vec![
                dir.path().join(LOSS_CHART_FILE_NAME),
                dir.path().join(THROUGHPUT_CHART_FILE_NAME)
            ]
        );
        let svg = fs::read_to_string(dir.path().join(LOSS_CHART_FILE_NAME)).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(!dir.path().join(JITTER_CHART_FILE_NAME).exists());
    }

    #[test]
    fn test_render_all_survives_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let result = sweep(vec![measured(10.0, 10.0, 0.0, Jitter::Measured(0.1))]);
        let written = ChartGenerator::new().render_all(&result, &dir.path().join("missing"));
        assert!(written.is_empty());
    }
}

//! SVG line charts.
//!
//! Charts are rendered to a self-contained SVG document string. There is no
//! rendering backend to install, so the only failure modes are bad input data
//! (no points, non-finite values, non-positive values on a log axis).

use std::fmt::Write;
use thiserror::Error;

const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 56.0;
const TICK_COUNT: usize = 5;

/// Errors produced while laying out a chart
#[derive(Error, Debug, PartialEq)]
pub enum PlotError {
    /// No series carries any point
    #[error("chart '{0}' has no data points")]
    Empty(String),

    /// NaN or infinite coordinate
    #[error("series '{0}' contains a non-finite value")]
    NonFinite(String),

    /// Log axis with a value <= 0
    #[error("log scale requires positive x values, got {0}")]
    NonPositiveLog(f64),
}

/// Axis scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    #[default]
    Linear,
    Log10,
}

impl Scale {
    fn apply(self, v: f64) -> f64 {
        match self {
            Scale::Linear => v,
            Scale::Log10 => v.log10(),
        }
    }

    fn invert(self, v: f64) -> f64 {
        match self {
            Scale::Linear => v,
            Scale::Log10 => 10f64.powf(v),
        }
    }
}

/// One line of a chart
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    /// Any SVG color, e.g. `"#d62728"`
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            points: Vec::new(),
        }
    }

    pub fn with_points(mut self, points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        self.points.extend(points);
        self
    }
}

/// A 2D line chart with one or more series
#[derive(Debug, Clone)]
pub struct LineChart {
    title: String,
    x_label: String,
    y_label: String,
    x_scale: Scale,
    width: u32,
    height: u32,
    series: Vec<Series>,
}

#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl LineChart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            x_scale: Scale::Linear,
            width: 800,
            height: 480,
            series: Vec::new(),
        }
    }

    pub fn x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = label.into();
        self
    }

    pub fn y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    pub fn x_scale(mut self, scale: Scale) -> Self {
        self.x_scale = scale;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Total number of points across all series
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    /// Render the chart to an SVG document
    pub fn render(&self) -> Result<String, PlotError> {
        if self.point_count() == 0 {
            return Err(PlotError::Empty(self.title.clone()));
        }

        for series in &self.series {
            for &(x, y) in &series.points {
                if !x.is_finite() || !y.is_finite() {
                    return Err(PlotError::NonFinite(series.name.clone()));
                }
                if self.x_scale == Scale::Log10 && x <= 0.0 {
                    return Err(PlotError::NonPositiveLog(x));
                }
            }
        }

        let (x_range, y_range) = self.ranges();
        let width = self.width as f64;
        let height = self.height as f64;
        let plot_w = width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = height - MARGIN_TOP - MARGIN_BOTTOM;

        let map_x = |x: f64| {
            MARGIN_LEFT + (self.x_scale.apply(x) - x_range.min) / x_range.span() * plot_w
        };
        let map_y = |y: f64| MARGIN_TOP + plot_h - (y - y_range.min) / y_range.span() * plot_h;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = self.width,
            h = self.height
        );
        let _ = write!(
            svg,
            r##"<rect width="{}" height="{}" fill="#ffffff"/>"##,
            self.width, self.height
        );
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="24" font-size="16" text-anchor="middle">{}</text>"#,
            width / 2.0,
            escape(&self.title)
        );

        // Grid and tick labels
        for i in 0..=TICK_COUNT {
            let frac = i as f64 / TICK_COUNT as f64;

            let tx = x_range.min + frac * x_range.span();
            let px = MARGIN_LEFT + frac * plot_w;
            let _ = write!(
                svg,
                r##"<line x1="{px:.1}" y1="{:.1}" x2="{px:.1}" y2="{:.1}" stroke="#e0e0e0"/>"##,
                MARGIN_TOP,
                MARGIN_TOP + plot_h
            );
            let _ = write!(
                svg,
                r#"<text x="{px:.1}" y="{:.1}" font-size="11" text-anchor="middle">{}</text>"#,
                MARGIN_TOP + plot_h + 16.0,
                format_tick(self.x_scale.invert(tx))
            );

            let ty = y_range.min + frac * y_range.span();
            let py = map_y(ty);
            let _ = write!(
                svg,
                r##"<line x1="{:.1}" y1="{py:.1}" x2="{:.1}" y2="{py:.1}" stroke="#e0e0e0"/>"##,
                MARGIN_LEFT,
                MARGIN_LEFT + plot_w
            );
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6.0,
                py + 4.0,
                format_tick(ty)
            );
        }

        // Axes
        let _ = write!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="#333333"/>"##,
            MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
        );
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="13" text-anchor="middle">{}</text>"#,
            MARGIN_LEFT + plot_w / 2.0,
            height - 14.0,
            escape(&self.x_label)
        );
        let _ = write!(
            svg,
            r#"<text x="18" y="{:.1}" font-size="13" text-anchor="middle" transform="rotate(-90 18 {:.1})">{}</text>"#,
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            escape(&self.y_label)
        );

        // Series
        for (idx, series) in self.series.iter().enumerate() {
            if series.points.is_empty() {
                continue;
            }
            let mut points = series.points.clone();
            points.sort_by(|a, b| a.0.total_cmp(&b.0));

            let path: Vec<String> = points
                .iter()
                .map(|&(x, y)| format!("{:.1},{:.1}", map_x(x), map_y(y)))
                .collect();
            let _ = write!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                path.join(" "),
                escape(&series.color)
            );
            for &(x, y) in &points {
                let _ = write!(
                    svg,
                    r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{}"/>"#,
                    map_x(x),
                    map_y(y),
                    escape(&series.color)
                );
            }

            // Legend entry
            let ly = MARGIN_TOP + 14.0 + idx as f64 * 18.0;
            let lx = MARGIN_LEFT + plot_w - 160.0;
            let _ = write!(
                svg,
                r#"<line x1="{lx:.1}" y1="{ly:.1}" x2="{:.1}" y2="{ly:.1}" stroke="{}" stroke-width="2"/>"#,
                lx + 20.0,
                escape(&series.color)
            );
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-size="12">{}</text>"#,
                lx + 26.0,
                ly + 4.0,
                escape(&series.name)
            );
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }

    /// Axis ranges in transformed (x) and data (y) space, padded so a
    /// single point or a flat line still gets a non-zero span.
    fn ranges(&self) -> (Range, Range) {
        let points = self.series.iter().flat_map(|s| s.points.iter());

        let mut x = Range {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        };
        let mut y = Range {
            min: 0.0,
            max: f64::NEG_INFINITY,
        };
        for &(px, py) in points {
            let tx = self.x_scale.apply(px);
            x.min = x.min.min(tx);
            x.max = x.max.max(tx);
            y.min = y.min.min(py);
            y.max = y.max.max(py);
        }

        if x.span() <= 0.0 {
            let pad = match self.x_scale {
                Scale::Linear => 1.0,
                Scale::Log10 => 0.5,
            };
            x.min -= pad;
            x.max += pad;
        }
        if y.span() <= 0.0 {
            y.max = y.min + 1.0;
        } else {
            y.max += y.span() * 0.05;
        }
        (x, y)
    }
}

fn format_tick(v: f64) -> String {
    let a = v.abs();
    if a >= 100.0 {
        format!("{:.0}", v)
    } else if a >= 1.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

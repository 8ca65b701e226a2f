//! Line charts drawn incrementally while training
//!
//! The [`Animator`] keeps every point it was given and redraws the whole figure after each
//! [`Animator::add`], the same way a notebook cell is cleared and displayed again. Figures are
//! rendered as SVG and, when an output path is configured, written to disk on every update so
//! that an image viewer (or a browser with auto-reload) shows the progress live.

use std::{
    fmt::{self, Display},
    ops::Range,
    path::{Path, PathBuf},
    str::FromStr,
};

use plotters::{
    coord::{Shift, types::RangedCoordf64},
    prelude::{
        Cartesian2d, ChartBuilder, ChartContext, DrawingArea, DrawingBackend, IntoDrawingArea,
        PathElement, SVGBackend,
    },
    series::{DashedLineSeries, LineSeries},
    style::{BLACK, Color, RGBColor, ShapeStyle, WHITE},
};
use thiserror::Error;

/// Pixels per inch used to turn a [`FigSize`] into an image size
pub const DPI: f64 = 100.0;

/// Errors raised while configuring or drawing a figure
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("failed to draw figure: {0}")]
    Drawing(String),
    #[error("failed to write figure: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid line format {0:?}")]
    InvalidFormat(String),
    #[error("invalid axis scale {0:?}, expected `linear` or `log`")]
    InvalidScale(String),
    #[error("axis limits {lo}..{hi} are not valid for a log scale")]
    InvalidLogLimits { lo: f64, hi: f64 },
    #[error("animator holds {expected} series but {got} values were added")]
    SeriesMismatch { expected: usize, got: usize },
}

fn drawing_err(e: impl Display) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Figure size in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigSize {
    pub width: f64,
    pub height: f64,
}

impl Default for FigSize {
    fn default() -> Self {
        Self {
            width: 3.5,
            height: 2.5,
        }
    }
}

impl FigSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Image size in pixels at [`DPI`]
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width * DPI).round().max(1.0) as u32,
            (self.height * DPI).round().max(1.0) as u32,
        )
    }
}

/// Axis scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scale {
    #[default]
    Linear,
    /// Base 10 logarithmic scale, non-positive values are not drawn
    Log,
}

impl Scale {
    fn apply(self, v: f64) -> Option<f64> {
        match self {
            Scale::Linear => Some(v),
            Scale::Log if v > 0.0 => Some(v.log10()),
            Scale::Log => None,
        }
    }

    /// Label of the tick at `v` on an axis spanning `span` plotting units
    fn tick_label(self, v: f64, span: f64) -> String {
        match self {
            Scale::Linear => format!("{v:.prec$}", prec = linear_decimals(span))
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
            Scale::Log => format!("{:.1e}", 10f64.powf(v)),
        }
    }
}

// one digit more than the order of magnitude of a tenth of the span, ticks are about that far apart
fn linear_decimals(span: f64) -> usize {
    if !(span.is_finite() && span > 0.0) {
        return 2;
    }
    let magnitude = -(span / 10.0).log10().ceil();
    (magnitude.max(0.0) as usize + 1).min(12)
}

impl FromStr for Scale {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Scale::Linear),
            "log" => Ok(Scale::Log),
            other => Err(PlotError::InvalidScale(other.to_string())),
        }
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Linear => write!(f, "linear"),
            Scale::Log => write!(f, "log"),
        }
    }
}

/// Labels, limits, scales and legend of a set of axes
#[derive(Debug, Clone, Default)]
pub struct AxesConfig {
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub xlim: Option<(f64, f64)>,
    pub ylim: Option<(f64, f64)>,
    pub xscale: Scale,
    pub yscale: Scale,
    pub legend: Vec<String>,
}

impl AxesConfig {
    pub fn with_xlabel(mut self, xlabel: impl Into<String>) -> Self {
        self.xlabel = Some(xlabel.into());
        self
    }

    pub fn with_ylabel(mut self, ylabel: impl Into<String>) -> Self {
        self.ylabel = Some(ylabel.into());
        self
    }

    pub fn with_xlim(mut self, lo: f64, hi: f64) -> Self {
        self.xlim = Some((lo, hi));
        self
    }

    pub fn with_ylim(mut self, lo: f64, hi: f64) -> Self {
        self.ylim = Some((lo, hi));
        self
    }

    pub fn with_xscale(mut self, scale: Scale) -> Self {
        self.xscale = scale;
        self
    }

    pub fn with_yscale(mut self, scale: Scale) -> Self {
        self.yscale = scale;
        self
    }

    pub fn with_legend<S: Into<String>>(mut self, legend: impl IntoIterator<Item = S>) -> Self {
        self.legend = legend.into_iter().map(Into::into).collect();
        self
    }
}

/// Builds a chart on `area` laid out according to `config`.
///
/// The limits and scales give the coordinate ranges, a missing limit falls back to the bounds
/// of `x_data` / `y_data`. Axis labels, tick labels and the grid are drawn right away; the
/// legend needs the labelled series and is drawn afterwards by [`draw_legend`].
pub fn set_axes<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    config: &AxesConfig,
    x_data: impl Iterator<Item = f64>,
    y_data: impl Iterator<Item = f64>,
) -> Result<ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>, PlotError> {
    let x_range = axis_range(config.xlim, config.xscale, x_data)?;
    let y_range = axis_range(config.ylim, config.yscale, y_data)?;
    let (x_span, y_span) = (x_range.end - x_range.start, y_range.end - y_range.start);
    let (xscale, yscale) = (config.xscale, config.yscale);
    let x_formatter = move |v: &f64| xscale.tick_label(*v, x_span);
    let y_formatter = move |v: &f64| yscale.tick_label(*v, y_span);

    let mut chart = ChartBuilder::on(area)
        .margin(8)
        .x_label_area_size(if config.xlabel.is_some() { 40 } else { 25 })
        .y_label_area_size(if config.ylabel.is_some() { 50 } else { 40 })
        .build_cartesian_2d(x_range, y_range)
        .map_err(drawing_err)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .light_line_style(BLACK.mix(0.05))
        .bold_line_style(BLACK.mix(0.15));
    if let Some(xlabel) = &config.xlabel {
        mesh.x_desc(xlabel.as_str());
    }
    if let Some(ylabel) = &config.ylabel {
        mesh.y_desc(ylabel.as_str());
    }
    mesh.draw().map_err(drawing_err)?;
    Ok(chart)
}

/// Draws the legend box of the labelled series, nothing when `config` has no legend
pub fn draw_legend<'a, DB: DrawingBackend + 'a>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    config: &AxesConfig,
) -> Result<(), PlotError> {
    if config.legend.is_empty() {
        return Ok(());
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(drawing_err)
}

/// Dash pattern of a line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dash {
    #[default]
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

/// Colour and dash pattern of a series, parsed from matplotlib style format strings such as
/// `"-"`, `"m--"`, `"g-."` or `"r:"`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFormat {
    /// `None` picks the colour from the default cycle by series index
    pub color: Option<RGBColor>,
    pub dash: Dash,
}

// matplotlib's tab10 cycle
const COLOR_CYCLE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn color_code(c: char) -> Option<RGBColor> {
    let color = match c {
        'b' => RGBColor(0, 0, 255),
        'g' => RGBColor(0, 128, 0),
        'r' => RGBColor(255, 0, 0),
        'c' => RGBColor(0, 191, 191),
        'm' => RGBColor(191, 0, 191),
        'y' => RGBColor(191, 191, 0),
        'k' => RGBColor(0, 0, 0),
        'w' => RGBColor(255, 255, 255),
        _ => return None,
    };
    Some(color)
}

impl LineFormat {
    fn style(&self, series: usize) -> ShapeStyle {
        let color = self
            .color
            .unwrap_or(COLOR_CYCLE[series % COLOR_CYCLE.len()]);
        color.stroke_width(2)
    }
}

impl FromStr for LineFormat {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (color, rest) = match chars.next().and_then(color_code) {
            Some(color) => (Some(color), chars.as_str()),
            None => (None, s),
        };
        let dash = match rest {
            "" | "-" => Dash::Solid,
            "--" => Dash::Dashed,
            "-." => Dash::DashDot,
            ":" => Dash::Dotted,
            _ => return Err(PlotError::InvalidFormat(s.to_string())),
        };
        Ok(Self { color, dash })
    }
}

/// The formats used when an animator is not given any: `-`, `m--`, `g-.`, `r:`
pub fn default_formats() -> Vec<LineFormat> {
    let magenta = color_code('m');
    let green = color_code('g');
    let red = color_code('r');
    vec![
        LineFormat {
            color: None,
            dash: Dash::Solid,
        },
        LineFormat {
            color: magenta,
            dash: Dash::Dashed,
        },
        LineFormat {
            color: green,
            dash: Dash::DashDot,
        },
        LineFormat {
            color: red,
            dash: Dash::Dotted,
        },
    ]
}

/// Incrementally plots several lines in the same figure
#[derive(Debug, Clone)]
pub struct Animator {
    axes: AxesConfig,
    fmts: Vec<LineFormat>,
    figsize: FigSize,
    output: Option<PathBuf>,
    xs: Vec<Vec<f64>>,
    ys: Vec<Vec<f64>>,
}

impl Animator {
    pub fn new(axes: AxesConfig) -> Self {
        Self {
            axes,
            fmts: default_formats(),
            figsize: FigSize::default(),
            output: None,
            xs: Vec::new(),
            ys: Vec::new(),
        }
    }

    pub fn with_formats(mut self, fmts: Vec<LineFormat>) -> Self {
        self.fmts = fmts;
        self
    }

    pub fn with_figsize(mut self, figsize: FigSize) -> Self {
        self.figsize = figsize;
        self
    }

    /// Writes the figure to `path` after every update
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn set_figsize(&mut self, figsize: FigSize) {
        self.figsize = figsize;
    }

    pub fn axes(&self) -> &AxesConfig {
        &self.axes
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Points recorded so far, one `(xs, ys)` pair per series
    pub fn series(&self) -> impl Iterator<Item = (&[f64], &[f64])> {
        self.xs
            .iter()
            .zip(self.ys.iter())
            .map(|(x, y)| (x.as_slice(), y.as_slice()))
    }

    /// Adds one value per series at the same `x`, skipping series whose value is `None`
    pub fn add(&mut self, x: f64, ys: &[Option<f64>]) -> Result<(), PlotError> {
        let xs = vec![Some(x); ys.len()];
        self.add_points(&xs, ys)
    }

    /// Adds the `i`-th pair of `xs` and `ys` to series `i`. Pairs where either side is
    /// `None` are skipped and surplus values on the longer side are ignored.
    ///
    /// The number of series is fixed by the first call.
    pub fn add_points(&mut self, xs: &[Option<f64>], ys: &[Option<f64>]) -> Result<(), PlotError> {
        let n = ys.len();
        if self.xs.is_empty() {
            self.xs = vec![Vec::new(); n];
            self.ys = vec![Vec::new(); n];
        }
        let pairs = xs.len().min(n);
        if pairs > self.xs.len() {
            return Err(PlotError::SeriesMismatch {
                expected: self.xs.len(),
                got: pairs,
            });
        }
        for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
            if let (Some(x), Some(y)) = (x, y) {
                self.xs[i].push(*x);
                self.ys[i].push(*y);
            }
        }
        self.display()
    }

    /// Redraws the figure and writes it to the output path, if any
    pub fn display(&self) -> Result<(), PlotError> {
        let svg = self.render_svg()?;
        if let Some(path) = &self.output {
            std::fs::write(path, svg)?;
            log::debug!("Figure written to '{}'.", path.display());
        }
        Ok(())
    }

    /// Renders the current figure as an SVG document
    pub fn render_svg(&self) -> Result<String, PlotError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.figsize.pixels()).into_drawing_area();
            root.fill(&WHITE).map_err(drawing_err)?;

            let mut chart = set_axes(
                &root,
                &self.axes,
                self.xs.iter().flatten().copied(),
                self.ys.iter().flatten().copied(),
            )?;

            for (i, (xs, ys)) in self.xs.iter().zip(self.ys.iter()).enumerate() {
                // like zip in the notebook helper, series without a format are not drawn
                let Some(fmt) = self.fmts.get(i) else {
                    break;
                };
                let style = fmt.style(i);
                let points = self.scaled(xs, ys);
                let anno = match fmt.dash {
                    Dash::Solid => chart.draw_series(LineSeries::new(points, style)),
                    Dash::Dashed => chart.draw_series(DashedLineSeries::new(points, 6, 4, style)),
                    Dash::DashDot => {
                        chart.draw_series(DashedLineSeries::new(points, 8, 3, style))
                    }
                    Dash::Dotted => chart.draw_series(DashedLineSeries::new(points, 2, 3, style)),
                }
                .map_err(drawing_err)?;
                if let Some(label) = self.axes.legend.get(i) {
                    anno.label(label.as_str())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], style));
                }
            }

            if !self.xs.is_empty() {
                draw_legend(&mut chart, &self.axes)?;
            }
            root.present().map_err(drawing_err)?;
        }
        Ok(svg)
    }

    fn scaled(&self, xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
        xs.iter()
            .zip(ys)
            .filter_map(|(x, y)| Some((self.axes.xscale.apply(*x)?, self.axes.yscale.apply(*y)?)))
            .collect()
    }
}

/// Range of an axis in plotting coordinates: the configured limits, or the data bounds
fn axis_range(
    lim: Option<(f64, f64)>,
    scale: Scale,
    data: impl Iterator<Item = f64>,
) -> Result<Range<f64>, PlotError> {
    let (lo, hi) = match lim {
        Some((lo, hi)) => match (scale.apply(lo), scale.apply(hi)) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Err(PlotError::InvalidLogLimits { lo, hi }),
        },
        None => data
            .filter_map(|v| scale.apply(v))
            .filter(|v| v.is_finite())
            .fold(None, |bounds, v| match bounds {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
            .unwrap_or((0.0, 1.0)),
    };
    if lo == hi {
        return Ok(lo - 0.5..hi + 0.5);
    }
    Ok(lo..hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(
            "-".parse::<LineFormat>().unwrap(),
            LineFormat {
                color: None,
                dash: Dash::Solid
            }
        );
        let fmt: LineFormat = "m--".parse().unwrap();
        assert_eq!(fmt.color, color_code('m'));
        assert_eq!(fmt.dash, Dash::Dashed);
        assert_eq!("g-.".parse::<LineFormat>().unwrap().dash, Dash::DashDot);
        assert_eq!("r:".parse::<LineFormat>().unwrap().dash, Dash::Dotted);
        assert_eq!("k".parse::<LineFormat>().unwrap().dash, Dash::Solid);
        assert!(matches!(
            "m~".parse::<LineFormat>(),
            Err(PlotError::InvalidFormat(s)) if s == "m~"
        ));
        let parsed = ["-", "m--", "g-.", "r:"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect::<Vec<LineFormat>>();
        assert_eq!(parsed, default_formats());
    }

    #[test]
    fn test_parse_scale() {
        assert_eq!("log".parse::<Scale>().unwrap(), Scale::Log);
        assert_eq!(Scale::Linear.to_string(), "linear");
        assert!("symlog".parse::<Scale>().is_err());
    }

    #[test]
    fn test_figsize_pixels() {
        assert_eq!(FigSize::default().pixels(), (350, 250));
        assert_eq!(FigSize::new(6.0, 4.0).pixels(), (600, 400));
    }

    #[test]
    fn test_add_skips_missing_values() {
        let mut animator = Animator::new(AxesConfig::default().with_legend(["train", "valid"]));
        animator.add(0.5, &[Some(2.0), None]).unwrap();
        animator.add(1.0, &[Some(1.5), Some(1.8)]).unwrap();
        let series = animator.series().collect::<Vec<_>>();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0], (&[0.5, 1.0][..], &[2.0, 1.5][..]));
        assert_eq!(series[1], (&[1.0][..], &[1.8][..]));
    }

    #[test]
    fn test_add_points_per_series_x() {
        let mut animator = Animator::new(AxesConfig::default());
        animator
            .add_points(&[Some(1.0), Some(2.0), Some(3.0)], &[Some(10.0), Some(20.0)])
            .unwrap();
        let series = animator.series().collect::<Vec<_>>();
        assert_eq!(series[0], (&[1.0][..], &[10.0][..]));
        assert_eq!(series[1], (&[2.0][..], &[20.0][..]));
    }

    #[test]
    fn test_series_count_fixed_by_first_add() {
        let mut animator = Animator::new(AxesConfig::default());
        animator.add(1.0, &[Some(1.0)]).unwrap();
        assert!(matches!(
            animator.add(2.0, &[Some(1.0), Some(2.0)]),
            Err(PlotError::SeriesMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_render_svg_contains_labels() {
        let axes = AxesConfig::default()
            .with_xlabel("epoch")
            .with_xlim(1.0, 10.0)
            .with_legend(["train loss", "valid loss"]);
        let mut animator = Animator::new(axes);
        animator.add(1.0, &[Some(2.3), Some(2.4)]).unwrap();
        animator.add(2.0, &[Some(1.1), None]).unwrap();
        let svg = animator.render_svg().unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("epoch"));
        assert!(svg.contains("train loss"));
        assert!(svg.contains("valid loss"));
    }

    #[test]
    fn test_display_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.svg");
        let mut animator = Animator::new(AxesConfig::default().with_yscale(Scale::Log))
            .with_output(&path)
            .with_figsize(FigSize::new(4.0, 3.0));
        animator.add(1.0, &[Some(0.1)]).unwrap();
        animator.add(2.0, &[Some(0.01)]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, animator.render_svg().unwrap());
    }

    #[test]
    fn test_tick_label_precision_follows_span() {
        assert_eq!(Scale::Linear.tick_label(0.0015, 0.004), "0.0015");
        assert_eq!(Scale::Linear.tick_label(0.001, 0.004), "0.001");
        assert_eq!(Scale::Linear.tick_label(0.0, 0.004), "0");
        assert_eq!(Scale::Linear.tick_label(2.5, 10.0), "2.5");
        assert_eq!(Scale::Linear.tick_label(40.0, 100.0), "40");
        assert_eq!(Scale::Log.tick_label(-2.0, 3.0), "1.0e-2");

        let mut animator = Animator::new(AxesConfig::default());
        animator.add(1.0, &[Some(0.001)]).unwrap();
        animator.add(2.0, &[Some(0.005)]).unwrap();
        let svg = animator.render_svg().unwrap();
        assert!(svg.contains("0.002"));
        assert!(svg.contains("0.004"));
    }

    #[test]
    fn test_set_axes_ranges_and_legend() {
        let config = AxesConfig::default()
            .with_xlabel("epoch")
            .with_ylabel("loss")
            .with_xlim(1.0, 5.0)
            .with_yscale(Scale::Log)
            .with_ylim(0.01, 1.0)
            .with_legend(["train loss"]);

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (350, 250)).into_drawing_area();
            let mut chart = set_axes(&root, &config, [0.0, 9.0].into_iter(), std::iter::empty())
                .unwrap();
            assert_eq!(chart.x_range(), 1.0..5.0);
            assert_eq!(chart.y_range(), -2.0..0.0);

            let style = BLACK.stroke_width(2);
            chart
                .draw_series(LineSeries::new(vec![(1.0, -1.0), (5.0, -2.0)], style))
                .unwrap()
                .label("train loss")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], style));
            draw_legend(&mut chart, &config).unwrap();
            root.present().unwrap();
        }
        assert!(svg.contains("epoch"));
        assert!(svg.contains("loss"));
        assert!(svg.contains("train loss"));

        let mut svg = String::new();
        let root = SVGBackend::with_string(&mut svg, (350, 250)).into_drawing_area();
        let bad_limits = AxesConfig::default().with_yscale(Scale::Log).with_ylim(0.0, 1.0);
        assert!(matches!(
            set_axes(&root, &bad_limits, std::iter::empty(), std::iter::empty()),
            Err(PlotError::InvalidLogLimits { .. })
        ));
    }

    #[test]
    fn test_axis_range() {
        let range = axis_range(None, Scale::Linear, [3.0, -1.0, 2.0].into_iter()).unwrap();
        assert_eq!(range, -1.0..3.0);
        let range = axis_range(None, Scale::Linear, std::iter::empty()).unwrap();
        assert_eq!(range, 0.0..1.0);
        let range = axis_range(None, Scale::Linear, [2.0].into_iter()).unwrap();
        assert_eq!(range, 1.5..2.5);
        let range = axis_range(Some((1.0, 100.0)), Scale::Log, std::iter::empty()).unwrap();
        assert_eq!(range, 0.0..2.0);
        assert!(matches!(
            axis_range(Some((0.0, 1.0)), Scale::Log, std::iter::empty()),
            Err(PlotError::InvalidLogLimits { .. })
        ));
    }
}

//! Plot context for the EOS comparison figure.
//!
//! A `PlotCanvas` is created once per run and passed to every rendering step:
//! each dataset adds an overlay (observed points + fitted curves) and the caller
//! renders the whole figure once with `save`. Nothing is drawn until then, so
//! overlays can be added in any order and bounds cover every dataset.
//!
//! Axes follow the convention of the source plots: pressure on the horizontal
//! axis, volume on the vertical axis.
//!
//! Text is rendered with a bundled DejaVu Sans face, so bitmap and SVG output
//! carry the same title, axis labels and legend on any host.

use std::path::Path;
use std::sync::OnceLock;

use image::{ColorType, ImageFormat};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};

use crate::domain::{Dataset, EosKind, EosParams};
use crate::models::pressure;
use crate::plot::PlotError;

/// Figure size in inches (width, height) before DPI scaling.
const FIGURE_INCHES: (f64, f64) = (6.4, 4.8);

/// Number of volumes used to draw each fitted curve.
const CURVE_SAMPLES: usize = 100;

const FONT_FAMILY: &str = "sans-serif";
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Curve colour for single-dataset figures.
pub const FIT_GRAY: RGBColor = RGBColor(128, 128, 128);

/// Where the legend goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendPlacement {
    /// Upper right corner inside the axes.
    Inside,
    /// To the right of the axes, top aligned; the plot area shrinks to fit it.
    Outside,
}

/// Label and colours for one dataset's overlay.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub label: String,
    pub marker: RGBColor,
    pub curve: RGBColor,
}

/// A fitted curve, already sampled as `(pressure, volume)` points.
#[derive(Debug, Clone)]
pub struct CurveOverlay {
    pub kind: EosKind,
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Everything drawn for one dataset.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub style: OverlayStyle,
    /// Observed `(pressure, volume)` pairs.
    pub points: Vec<(f64, f64)>,
    pub curves: Vec<CurveOverlay>,
}

#[derive(Debug, Clone)]
pub struct PlotCanvas {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub dpi: u32,
    pub legend: LegendPlacement,
    overlays: Vec<Overlay>,
}

impl PlotCanvas {
    pub fn new(title: impl Into<String>, dpi: u32) -> Self {
        Self {
            title: title.into(),
            x_label: "Pressure".to_string(),
            y_label: "Volume".to_string(),
            dpi,
            legend: LegendPlacement::Inside,
            overlays: Vec::new(),
        }
    }

    pub fn with_legend(mut self, legend: LegendPlacement) -> Self {
        self.legend = legend;
        self
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Add a dataset's observed points and the curves for `fits`.
    ///
    /// Non-finite points are left out of the drawing.
    pub fn add_dataset(&mut self, dataset: &Dataset, style: OverlayStyle, fits: &[(EosKind, EosParams)]) {
        let points: Vec<(f64, f64)> = dataset
            .pressures
            .iter()
            .zip(dataset.volumes.iter())
            .map(|(&p, &v)| (p, v))
            .filter(|(p, v)| p.is_finite() && v.is_finite())
            .collect();

        let curves = match dataset.volume_range() {
            Some((v_min, v_max)) => fits
                .iter()
                .map(|(kind, params)| CurveOverlay {
                    kind: *kind,
                    label: curve_label(*kind, params),
                    points: sample_curve(*kind, params, v_min, v_max, CURVE_SAMPLES),
                })
                .collect(),
            None => Vec::new(),
        };

        self.overlays.push(Overlay { style, points, curves });
    }

    /// Pixel size for the configured DPI.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (
            (FIGURE_INCHES.0 * dpi).round() as u32,
            (FIGURE_INCHES.1 * dpi).round() as u32,
        )
    }

    /// `(x_min, x_max, y_min, y_max)` over every point and curve, padded by 5%.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let all = self
            .overlays
            .iter()
            .flat_map(|o| o.points.iter().chain(o.curves.iter().flat_map(|c| c.points.iter())));

        let mut acc: Option<(f64, f64, f64, f64)> = None;
        for &(x, y) in all {
            acc = Some(match acc {
                None => (x, x, y, y),
                Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
            });
        }

        acc.map(|(x0, x1, y0, y1)| {
            let (x0, x1) = pad(x0, x1);
            let (y0, y1) = pad(y0, y1);
            (x0, x1, y0, y1)
        })
    }

    /// Render every overlay to `path`.
    ///
    /// `.svg` writes SVG; `.jpg`/`.jpeg` and `.bmp` write those formats; any
    /// other extension, or none, writes PNG.
    pub fn save(&self, path: &Path) -> Result<(), PlotError> {
        let render_err = |message: String| PlotError::Render {
            path: path.to_path_buf(),
            message,
        };

        if is_svg(path) {
            let bounds = self.prepare()?;
            let root = SVGBackend::new(path, self.pixel_size()).into_drawing_area();
            draw_figure(&root, self, bounds).map_err(|e| render_err(e.to_string()))?;
            root.present().map_err(|e| render_err(e.to_string()))?;
            return Ok(());
        }

        let (width, height) = self.pixel_size();
        let pixels = self.render_rgb().map_err(|e| match e {
            PlotError::Render { message, .. } => render_err(message),
            other => other,
        })?;
        image::save_buffer_with_format(path, &pixels, width, height, ColorType::Rgb8, raster_format(path))
            .map_err(|e| render_err(e.to_string()))
    }

    /// Render the figure into an RGB pixel buffer of `pixel_size()`.
    pub fn render_rgb(&self) -> Result<Vec<u8>, PlotError> {
        let bounds = self.prepare()?;
        let (width, height) = self.pixel_size();
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
            let render_err = |message: String| PlotError::Render {
                path: "<buffer>".into(),
                message,
            };
            draw_figure(&root, self, bounds).map_err(|e| render_err(e.to_string()))?;
            root.present().map_err(|e| render_err(e.to_string()))?;
        }
        Ok(pixels)
    }

    fn prepare(&self) -> Result<(f64, f64, f64, f64), PlotError> {
        if self.dpi == 0 {
            return Err(PlotError::InvalidDpi(self.dpi));
        }
        let Some(bounds) = self.bounds() else {
            return Err(PlotError::Empty);
        };
        ensure_font()?;
        Ok(bounds)
    }
}

fn ensure_font() -> Result<(), PlotError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED.get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, BUNDLED_FONT).is_ok());
    if ok { Ok(()) } else { Err(PlotError::Font) }
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Encoder for a bitmap path; PNG unless the extension names JPEG or BMP.
fn raster_format(path: &Path) -> ImageFormat {
    path.extension()
        .and_then(|e| ImageFormat::from_extension(e))
        .filter(|f| matches!(f, ImageFormat::Jpeg | ImageFormat::Bmp))
        .unwrap_or(ImageFormat::Png)
}

fn draw_figure<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    canvas: &PlotCanvas,
    (x0, x1, y0, y1): (f64, f64, f64, f64),
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    // Sizes are specified in points and scaled to pixels, so a higher DPI gives
    // the same figure at a finer resolution.
    let px = |pt: f64| (pt * f64::from(canvas.dpi) / 72.0).round().max(1.0);

    let legend_font = (FONT_FAMILY, px(8.0)).into_font();
    let legend_swatch = px(16.0) as u32;
    let legend_pad = px(4.0) as u32;
    let margin = px(8.0) as u32;

    // An outside legend needs room to the right of the axes.
    let legend_room = match canvas.legend {
        LegendPlacement::Inside => 0,
        LegendPlacement::Outside => {
            let style: TextStyle = legend_font.clone().into();
            let mut widest = 0;
            for label in legend_labels(canvas) {
                widest = widest.max(root.estimate_text_size(label, &style)?.0);
            }
            widest + legend_swatch + 3 * legend_pad
        }
    };

    let mut chart = ChartBuilder::on(root)
        .margin(margin)
        .margin_right(margin + legend_room)
        .caption(&canvas.title, (FONT_FAMILY, px(12.0)).into_font())
        .x_label_area_size(px(28.0) as u32)
        .y_label_area_size(px(36.0) as u32)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(canvas.x_label.as_str())
        .y_desc(canvas.y_label.as_str())
        .label_style((FONT_FAMILY, px(9.0)).into_font())
        .axis_desc_style((FONT_FAMILY, px(10.0)).into_font())
        .draw()?;

    let line_width = px(1.5) as u32;
    let marker = px(3.5) as u32;
    let edge = BLACK.stroke_width(px(0.5) as u32);
    let (dash, gap) = (px(1.5) as u32, px(2.5) as u32);

    for overlay in canvas.overlays() {
        let color = overlay.style.marker;
        let style = overlay.style.curve.stroke_width(line_width);

        for curve in &overlay.curves {
            chart
                .draw_series(DashedLineSeries::new(curve.points.iter().copied(), dash, gap, style))?
                .label(curve.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_swatch as i32, y)], style));
        }

        chart
            .draw_series(
                overlay
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), marker, color.filled())),
            )?
            .label(overlay.style.label.as_str())
            .legend(move |(x, y)| Circle::new((x + marker as i32, y), marker, color.filled()));
        chart.draw_series(overlay.points.iter().map(|&(x, y)| Circle::new((x, y), marker, edge)))?;
    }

    let position = match canvas.legend {
        LegendPlacement::Inside => SeriesLabelPosition::UpperRight,
        LegendPlacement::Outside => {
            let (area_w, _) = chart.plotting_area().dim_in_pixel();
            SeriesLabelPosition::Coordinate(area_w as i32 + legend_pad as i32, 0)
        }
    };
    chart
        .configure_series_labels()
        .position(position)
        .legend_area_size(legend_swatch)
        .margin(legend_pad)
        .label_font(legend_font)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

fn legend_labels(canvas: &PlotCanvas) -> impl Iterator<Item = &str> {
    canvas.overlays().iter().flat_map(|o| {
        o.curves
            .iter()
            .map(|c| c.label.as_str())
            .chain(std::iter::once(o.style.label.as_str()))
    })
}

/// `(pressure, volume)` points of a fitted curve over `[v_min, v_max]`.
pub fn sample_curve(kind: EosKind, params: &EosParams, v_min: f64, v_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let v = v_min + (v_max - v_min) * i as f64 / (n - 1) as f64;
            (pressure(kind, v, params), v)
        })
        .filter(|(p, v)| p.is_finite() && v.is_finite())
        .collect()
}

/// Legend label for a fitted curve.
pub fn curve_label(kind: EosKind, params: &EosParams) -> String {
    format!(
        "{} Fit: V0={:5.3}, K0={:5.3}, K0_prime={:5.3}",
        kind.display_name(),
        params.v0,
        params.k0,
        params.k0_prime
    )
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    let span = hi - lo;
    let margin = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - margin, hi + margin)
}

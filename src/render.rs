//! Ensemble spread plots.
//!
//! Rendering is split in two steps. [`ensemble_series`] turns a member × time
//! array and its [`EnsembleStatistics`] into a list of [`PlotSeries`], each
//! tagged with a [`SeriesRole`]. [`render_svg`] then draws a [`PlotSpec`] with
//! `plotters`. Keeping the series list separate from drawing makes it easy to
//! check what will be drawn without parsing SVG.

use plotters::coord::Shift;
use plotters::prelude::*;
use rsice_core::ensemble::EnsembleStatistics;
use rsice_core::errors::{RSIceError, RSIceResult};
use rsice_core::labeled::{FloatValue, LabeledArray};
use rsice_core::schema::DIM_TIME;
use rsice_core::transforms::SeriesTransform;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// What a line represents, which decides how it is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesRole {
    /// One ensemble member, drawn light without a legend entry
    Member,
    /// A member repeated once with a legend entry standing for all members
    Representative,
    Mean,
    PlusSigma,
    MinusSigma,
    /// One grid cell (and category) of an Icepack history variable
    History,
}

impl SeriesRole {
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            SeriesRole::Mean | SeriesRole::PlusSigma | SeriesRole::MinusSigma
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub role: SeriesRole,
    /// Legend entry. `None` for undifferentiated member lines.
    pub label: Option<String>,
    /// Index of the dataset the series belongs to, used to pick a colour
    pub group: usize,
    pub points: Vec<(FloatValue, FloatValue)>,
}

/// Visible x range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum XWindow {
    /// Span all data
    #[default]
    Full,
    Range(FloatValue, FloatValue),
}

impl From<Option<[FloatValue; 2]>> for XWindow {
    fn from(value: Option<[FloatValue; 2]>) -> Self {
        match value {
            Some([start, end]) => XWindow::Range(start, end),
            None => XWindow::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub window: XWindow,
    pub width: u32,
    pub height: u32,
    pub series: Vec<PlotSeries>,
}

impl PlotSpec {
    pub fn count(&self, role: SeriesRole) -> usize {
        self.series.iter().filter(|s| s.role == role).count()
    }

    pub fn labelled(&self) -> impl Iterator<Item = &PlotSeries> {
        self.series.iter().filter(|s| s.label.is_some())
    }
}

/// The x values of a 1-D series: its coordinate if present, else 0, 1, 2, ...
fn x_values(array: &LabeledArray, dim: &str, len: usize) -> Vec<FloatValue> {
    match array.coord(dim) {
        Some(coord) if coord.len() == len => coord.to_vec(),
        _ => (0..len).map(|i| i as FloatValue).collect(),
    }
}

fn points_of(array: &LabeledArray) -> RSIceResult<Vec<(FloatValue, FloatValue)>> {
    let values = array.to_vec1()?;
    let dim = array.dims()[0].as_str();
    let xs = x_values(array, dim, values.len());
    Ok(xs.into_iter().zip(values).collect())
}

/// Series for one dataset: every member unlabelled, member 0 again as the
/// labelled representative, then mean, +σ and −σ.
///
/// `members` must be two-dimensional with `member_dim` as one of its axes.
pub fn ensemble_series(
    label: &str,
    group: usize,
    members: &LabeledArray,
    member_dim: &str,
    stats: &EnsembleStatistics,
) -> RSIceResult<Vec<PlotSeries>> {
    if members.ndim() != 2 {
        return Err(RSIceError::ShapeMismatch(format!(
            "expected a member x time array for '{}', got dimensions {:?}",
            members.name(),
            members.dims()
        )));
    }
    let count = members.len_of(member_dim)?;
    let mut series = Vec::with_capacity(count + 4);

    for m in 0..count {
        series.push(PlotSeries {
            role: SeriesRole::Member,
            label: None,
            group,
            points: points_of(&members.isel(member_dim, m)?)?,
        });
    }
    if count > 0 {
        series.push(PlotSeries {
            role: SeriesRole::Representative,
            label: Some(format!("{} members", label)),
            group,
            points: points_of(&members.isel(member_dim, 0)?)?,
        });
    }
    for (role, suffix, array) in [
        (SeriesRole::Mean, "mean", &stats.mean),
        (SeriesRole::PlusSigma, "mean + σ", &stats.plus_sigma),
        (SeriesRole::MinusSigma, "mean − σ", &stats.minus_sigma),
    ] {
        series.push(PlotSeries {
            role,
            label: Some(format!("{} {}", label, suffix)),
            group,
            points: points_of(array)?,
        });
    }

    debug!(dataset = label, series = series.len(), "Built plot series");
    Ok(series)
}

/// Series for one history variable at grid cell `cell`.
///
/// The cell is selected on `cell_dim`, `transform` is applied along time and
/// the result is drawn as one line, or one line per category when a second
/// dimension remains. Lines are labelled `"<label> (<cell>)"` or
/// `"<label> (<cell>, <category>)"`; categories take consecutive colours from
/// `group`.
pub fn history_series(
    label: &str,
    group: usize,
    array: &LabeledArray,
    cell_dim: &str,
    cell: usize,
    transform: &SeriesTransform,
) -> RSIceResult<Vec<PlotSeries>> {
    let column = transform.apply(&array.isel(cell_dim, cell)?, DIM_TIME)?;
    let series = match column.ndim() {
        1 => vec![PlotSeries {
            role: SeriesRole::History,
            label: Some(format!("{} ({})", label, cell)),
            group,
            points: points_of(&column)?,
        }],
        2 => {
            let category_dim = column
                .dims()
                .iter()
                .find(|d| d.as_str() != DIM_TIME)
                .cloned()
                .ok_or_else(|| RSIceError::MissingDimension {
                    dim: "category".to_string(),
                    available: column.dims().join(", "),
                })?;
            let count = column.len_of(&category_dim)?;
            let categories = x_values(&column, &category_dim, count);
            let mut series = Vec::with_capacity(count);
            for (k, category) in categories.into_iter().enumerate() {
                series.push(PlotSeries {
                    role: SeriesRole::History,
                    label: Some(format!("{} ({}, {})", label, cell, category)),
                    group: group + k,
                    points: points_of(&column.isel(&category_dim, k)?)?,
                });
            }
            series
        }
        _ => {
            return Err(RSIceError::ShapeMismatch(format!(
                "expected time or time x category for '{}' at one cell, got dimensions {:?}",
                array.name(),
                column.dims()
            )))
        }
    };

    debug!(run = label, cell, series = series.len(), "Built history series");
    Ok(series)
}

const PALETTE: [RGBColor; 4] = [
    RGBColor(31, 73, 125),
    RGBColor(178, 34, 34),
    RGBColor(34, 110, 60),
    RGBColor(120, 60, 140),
];

fn colour(group: usize) -> RGBColor {
    PALETTE[group % PALETTE.len()]
}

fn style_of(series: &PlotSeries) -> ShapeStyle {
    let base = colour(series.group);
    match series.role {
        SeriesRole::Member => base.mix(0.25).stroke_width(1),
        SeriesRole::Representative => base.mix(0.5).stroke_width(1),
        SeriesRole::Mean => base.stroke_width(3),
        SeriesRole::PlusSigma | SeriesRole::MinusSigma => base.stroke_width(2),
        SeriesRole::History => base.stroke_width(2),
    }
}

fn ranges(spec: &PlotSpec) -> RSIceResult<((FloatValue, FloatValue), (FloatValue, FloatValue))> {
    let finite = spec
        .series
        .iter()
        .flat_map(|s| s.points.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite());

    let (x_min, x_max) = match spec.window {
        XWindow::Range(start, end) => (start, end),
        XWindow::Full => finite
            .clone()
            .fold((FloatValue::INFINITY, FloatValue::NEG_INFINITY), |(lo, hi), (x, _)| {
                (lo.min(*x), hi.max(*x))
            }),
    };
    let (y_min, y_max) = finite
        .filter(|(x, _)| *x >= x_min && *x <= x_max)
        .fold((FloatValue::INFINITY, FloatValue::NEG_INFINITY), |(lo, hi), (_, y)| {
            (lo.min(*y), hi.max(*y))
        });

    if !(x_min.is_finite() && y_min.is_finite()) {
        return Err(RSIceError::Render("no finite data inside the plot window".to_string()));
    }
    let pad = |lo: FloatValue, hi: FloatValue, frac: FloatValue| {
        if hi > lo {
            let d = (hi - lo) * frac;
            (lo - d, hi + d)
        } else {
            (lo - 0.5, hi + 0.5)
        }
    };
    Ok((pad(x_min, x_max, 0.0), pad(y_min, y_max, 0.05)))
}

fn draw(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    spec: &PlotSpec,
    x_range: (FloatValue, FloatValue),
    y_range: (FloatValue, FloatValue),
) -> Result<(), DrawingAreaErrorKind<std::io::Error>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .caption(spec.title.as_str(), ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    // Members first so the aggregates sit on top
    for series in &spec.series {
        let style = style_of(series);
        let points = series
            .points
            .iter()
            .copied()
            .filter(|(x, _)| *x >= x_range.0 && *x <= x_range.1);
        let drawn = chart.draw_series(LineSeries::new(points, style))?;
        if let Some(label) = &series.label {
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], style));
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Draw `spec` as an SVG document.
pub fn render_svg(spec: &PlotSpec) -> RSIceResult<String> {
    let (x_range, y_range) = ranges(spec)?;
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (spec.width, spec.height)).into_drawing_area();
        draw(&root, spec, x_range, y_range).map_err(|e| RSIceError::Render(e.to_string()))?;
    }
    Ok(svg)
}

/// Draw `spec` and write it to `path`, creating parent directories.
pub fn render_svg_file(spec: &PlotSpec, path: &Path) -> RSIceResult<()> {
    let svg = render_svg(spec)?;
    let io_error = |source| RSIceError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, svg).map_err(io_error)?;
    info!(path = %path.display(), series = spec.series.len(), "Wrote figure");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsice_core::ensemble::{ensemble_statistics, StdConvention};

    fn synthetic(members: usize, years: usize) -> LabeledArray {
        let data = (0..members * years)
            .map(|i| 4.0e6 + (i % years) as f64 * 1.0e4 - (i / years) as f64 * 5.0e4)
            .collect();
        LabeledArray::from_shape_vec("aice_monthly", ["n_members", "time"], &[members, years], data)
            .unwrap()
            .with_coord("time", (0..years).map(|y| 2000.0 + y as f64).collect())
            .unwrap()
    }

    fn spec_for(members: usize, years: usize, window: XWindow) -> PlotSpec {
        let arr = synthetic(members, years);
        let stats = ensemble_statistics(&arr, "n_members", StdConvention::Population).unwrap();
        PlotSpec {
            title: "September sea-ice area".to_string(),
            x_label: "Year".to_string(),
            y_label: "Area (km^2)".to_string(),
            window,
            width: 800,
            height: 500,
            series: ensemble_series("LE", 0, &arr, "n_members", &stats).unwrap(),
        }
    }

    #[test]
    fn three_members_give_seven_series() {
        let spec = spec_for(3, 5, XWindow::Full);
        assert_eq!(spec.series.len(), 7);
        assert_eq!(spec.count(SeriesRole::Member), 3);
        assert_eq!(spec.count(SeriesRole::Representative), 1);
        assert_eq!(spec.count(SeriesRole::Mean), 1);
        assert_eq!(spec.count(SeriesRole::PlusSigma), 1);
        assert_eq!(spec.count(SeriesRole::MinusSigma), 1);

        // Member lines are unlabelled; everything else is in the legend
        assert!(spec
            .series
            .iter()
            .filter(|s| s.role == SeriesRole::Member)
            .all(|s| s.label.is_none()));
        assert_eq!(spec.labelled().count(), 4);
        assert!(spec.series.iter().all(|s| s.points.len() == 5));
    }

    #[test]
    fn x_values_come_from_time_coordinate() {
        let spec = spec_for(2, 3, XWindow::Full);
        let mean = spec
            .series
            .iter()
            .find(|s| s.role == SeriesRole::Mean)
            .unwrap();
        let xs: Vec<f64> = mean.points.iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![2000.0, 2001.0, 2002.0]);
    }

    #[test]
    fn svg_contains_literal_labels() {
        let svg = render_svg(&spec_for(3, 5, XWindow::Full)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("September sea-ice area"));
        assert!(svg.contains("Year"));
        assert!(svg.contains("LE mean"));
        assert!(svg.contains("LE members"));
    }

    #[test]
    fn zoomed_window() {
        let svg = render_svg(&spec_for(3, 5, XWindow::Range(2001.0, 2003.0))).unwrap();
        assert!(svg.contains("<polyline") || svg.contains("<path"));
    }

    #[test]
    fn empty_window_is_an_error() {
        let spec = spec_for(3, 5, XWindow::Range(1900.0, 1950.0));
        assert!(matches!(render_svg(&spec), Err(RSIceError::Render(_))));
    }

    #[test]
    fn window_from_config() {
        assert_eq!(XWindow::from(None), XWindow::Full);
        assert_eq!(
            XWindow::from(Some([1979.0, 2020.0])),
            XWindow::Range(1979.0, 2020.0)
        );
    }

    fn history_cells() -> LabeledArray {
        // time x ni x ncat, value = 100 t + 10 cell + cat
        let data = (0..4 * 2 * 2)
            .map(|i| (100 * (i / 4) + 10 * ((i / 2) % 2) + i % 2) as f64)
            .collect();
        LabeledArray::from_shape_vec("aicen", ["time", "ni", "ncat"], &[4, 2, 2], data)
            .unwrap()
            .with_coord("ncat", vec![1.0, 2.0])
            .unwrap()
    }

    #[test]
    fn history_line_per_category() {
        let series =
            history_series("sheba", 1, &history_cells(), "ni", 1, &SeriesTransform::default())
                .unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|s| s.role == SeriesRole::History));
        assert_eq!(series[0].label.as_deref(), Some("sheba (1, 1)"));
        assert_eq!(series[1].label.as_deref(), Some("sheba (1, 2)"));
        assert_eq!((series[0].group, series[1].group), (1, 2));
        let ys: Vec<f64> = series[1].points.iter().map(|p| p.1).collect();
        assert_eq!(ys, vec![11.0, 111.0, 211.0, 311.0]);
    }

    #[test]
    fn history_line_is_transformed() {
        let one_cat = history_cells().isel("ncat", 0).unwrap();
        let transform = SeriesTransform {
            resample: Some(2),
            cumulative: true,
            mult: 2.0,
        };
        let series = history_series("sheba", 0, &one_cat, "ni", 0, &transform).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label.as_deref(), Some("sheba (0)"));
        // block means 50 and 250, running totals 50 and 300, doubled
        let ys: Vec<f64> = series[0].points.iter().map(|p| p.1).collect();
        assert_eq!(ys, vec![100.0, 600.0]);

        assert!(matches!(
            history_series("sheba", 0, &one_cat, "ni", 5, &transform),
            Err(RSIceError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figs").join("out.svg");
        render_svg_file(&spec_for(2, 4, XWindow::Full), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("</svg>"));
    }
}

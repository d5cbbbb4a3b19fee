//! Icepack history plots: one variable at one grid cell, across runs.

use crate::render::{history_series, PlotSpec, XWindow};
use rsice_core::errors::{RSIceError, RSIceResult};
use rsice_core::history::{load_history, HistoryOptions, DIM_CELL};
use rsice_core::schema::DIM_TIME;
use rsice_core::transforms::SeriesTransform;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which runs to load and what to draw from them.
#[derive(Debug, Clone)]
pub struct HistoryPlot {
    /// Directory holding `runs/<run_name>/history`
    pub icepack_dirs: PathBuf,
    pub runs: Vec<String>,
    /// History file to open in every run. The first one when unset.
    pub filename: Option<String>,
    pub variable: String,
    pub cell: usize,
    pub options: HistoryOptions,
    pub transform: SeriesTransform,
    pub width: u32,
    pub height: u32,
}

impl HistoryPlot {
    pub fn new(icepack_dirs: impl AsRef<Path>, runs: Vec<String>, variable: &str) -> Self {
        Self {
            icepack_dirs: icepack_dirs.as_ref().to_path_buf(),
            runs,
            filename: None,
            variable: variable.to_string(),
            cell: 0,
            options: HistoryOptions::default(),
            transform: SeriesTransform::default(),
            width: 1000,
            height: 600,
        }
    }

    /// Load every run and build the figure.
    ///
    /// Each run starts a new colour after the lines of the previous one, so
    /// runs and categories stay distinct.
    pub fn plot_spec(&self) -> RSIceResult<PlotSpec> {
        if self.runs.is_empty() {
            return Err(RSIceError::Config("no Icepack runs given".to_string()));
        }

        let mut series = Vec::new();
        let mut x_label = None;
        let mut y_label = None;
        for run in &self.runs {
            let dataset = load_history(
                &self.icepack_dirs,
                run,
                self.filename.as_deref(),
                &self.options,
            )?;
            let array = dataset.variable(&self.variable)?;
            if x_label.is_none() {
                x_label = dataset
                    .variable(DIM_TIME)
                    .ok()
                    .and_then(|t| t.units())
                    .map(str::to_string);
            }
            if y_label.is_none() {
                y_label = array
                    .units()
                    .map(|units| format!("{} ({})", self.variable, units));
            }
            let lines =
                history_series(run, series.len(), array, DIM_CELL, self.cell, &self.transform)?;
            series.extend(lines);
        }

        info!(
            variable = %self.variable,
            runs = self.runs.len(),
            series = series.len(),
            "Built history plot"
        );
        Ok(PlotSpec {
            title: self.variable.clone(),
            x_label: x_label.unwrap_or_else(|| DIM_TIME.to_string()),
            y_label: y_label.unwrap_or_else(|| self.variable.clone()),
            window: XWindow::Full,
            width: self.width,
            height: self.height,
            series,
        })
    }
}

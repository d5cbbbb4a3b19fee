//! Pipeline configuration
//!
//! A run is described by a TOML file listing the datasets to compare, the month
//! to extract and how to draw the figure.
//!
//! ```toml
//! month = 9
//! std = "population"
//!
//! [[datasets]]
//! label = "CESM2 LE"
//! directory = "/data/cesm2"
//! filename = "aice_monthly.nc"
//! convention = "month-indexed"
//!
//! [plot]
//! title = "September Arctic sea-ice area"
//! x_label = "Year"
//! y_label = "Sea-ice area (km^2)"
//! window = [1979.0, 2020.0]
//! output = "september.svg"
//! ```

use crate::ensemble::StdConvention;
use crate::errors::{RSIceError, RSIceResult};
use crate::schema::{DataConvention, VAR_AICE_MONTHLY};
use crate::selection::{Month, MonthSelector, TimeStamps};
use crate::units::AreaUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One ensemble dataset to load and reduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Legend label
    pub label: String,
    pub directory: PathBuf,
    pub filename: String,
    /// Variable holding sea-ice area.
    /// Default: `aice_monthly`
    #[serde(default = "default_variable")]
    pub variable: String,
    pub convention: DataConvention,
    /// Override for the member dimension. Defaults to the convention's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_dim: Option<String>,
    /// Units to assume when the variable has no `units` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<AreaUnit>,
    /// Calendar-time datasets only: match months on the stored `time` values
    /// (`as-stored`) or on the midpoints of `time_bnds` (`bounds-midpoint`).
    /// Default: `as-stored`
    #[serde(default)]
    pub time_stamps: TimeStamps,
}

fn default_variable() -> String {
    VAR_AICE_MONTHLY.name.to_string()
}

impl DatasetConfig {
    pub fn member_dim(&self) -> &str {
        self.member_dim
            .as_deref()
            .unwrap_or_else(|| self.convention.member_dim())
    }

    pub fn selector(&self, month: Month) -> MonthSelector {
        self.convention.selector(month, self.time_stamps)
    }
}

/// Figure settings. Labels are drawn verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Visible x range. The full time range is shown when unset.
    pub window: Option<[f64; 2]>,
    /// Image width in pixels.
    /// Default: 1000
    pub width: u32,
    /// Image height in pixels.
    /// Default: 600
    pub height: u32,
    /// Default: `sea_ice_area.svg`
    pub output: PathBuf,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            title: "Sea-ice area".to_string(),
            x_label: "Year".to_string(),
            y_label: "Sea-ice area (km^2)".to_string(),
            window: None,
            width: 1000,
            height: 600,
            output: PathBuf::from("sea_ice_area.svg"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Calendar month 1-12. Must be given here or on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default)]
    pub std: StdConvention,
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> RSIceResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RSIceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> RSIceResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RSIceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> RSIceResult<String> {
        toml::to_string(self).map_err(|e| RSIceError::Config(e.to_string()))
    }

    fn validate(&self) -> RSIceResult<()> {
        if self.datasets.is_empty() {
            return Err(RSIceError::Config("at least one dataset is required".to_string()));
        }
        if let Some([start, end]) = self.plot.window {
            if !(start < end) {
                return Err(RSIceError::Config(format!(
                    "plot window start {} must be before end {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

//! Icepack history output.
//!
//! Icepack writes its history files to `<icepack_dirs>/runs/<run_name>/history/`.
//! [`load_history`] opens one of them, adds the requested derived variables from
//! [`crate::derived`] and records the run name in the `run_name` attribute so
//! plots can label each line with the run it came from.

use crate::dataset::Dataset;
use crate::derived::{
    add_net_surface_heat_flux, add_pond_budget, add_pond_volume, add_sst_above_freezing,
    extract_tracers,
};
use crate::errors::{RSIceError, RSIceResult};
use crate::loader::{is_supported, open_dataset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub const DIR_RUNS: &str = "runs";
pub const DIR_HISTORY: &str = "history";
pub const ATTR_RUN_NAME: &str = "run_name";

/// Grid cell axis of the single-column driver.
pub const DIM_CELL: &str = "ni";
pub const DIM_CATEGORY: &str = "ncat";
pub const DIM_TRACER: &str = "ntrcr";

/// A tracer index on `ntrcr` and the variable name to copy it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerName {
    pub index: usize,
    pub name: String,
}

impl FromStr for TracerName {
    type Err = RSIceError;

    /// Parse `index=name`, e.g. `1=alvl`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RSIceError::Config(format!("expected <index>=<name>, got '{}'", s));
        let (index, name) = s.split_once('=').ok_or_else(invalid)?;
        let index = index.trim().parse().map_err(|_| invalid())?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            index,
            name: name.to_string(),
        })
    }
}

/// Which derived variables to add after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryOptions {
    /// `sst_above_frz = sst - Tf`.
    /// Default: true
    pub sst_above_frz: bool,
    /// Pond volume `volp`/`volpn`
    pub volp: bool,
    /// Net surface heat flux `snhf`
    pub snhf: bool,
    /// Pond freshwater budget. Needs `volp`.
    pub pnd_budget: bool,
    /// Tracers to copy out of `trcr`
    pub trcr: Vec<TracerName>,
    /// Category tracers to copy out of `trcrn`
    pub trcrn: Vec<TracerName>,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            sst_above_frz: true,
            volp: false,
            snhf: false,
            pnd_budget: false,
            trcr: Vec::new(),
            trcrn: Vec::new(),
        }
    }
}

pub fn history_dir(icepack_dirs: &Path, run_name: &str) -> PathBuf {
    icepack_dirs.join(DIR_RUNS).join(run_name).join(DIR_HISTORY)
}

/// Name of the first history file in `dir`, by file name.
///
/// Files the loader cannot open are ignored.
pub fn first_history_file(dir: &Path) -> RSIceResult<String> {
    let entries = std::fs::read_dir(dir).map_err(|source| RSIceError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
        .collect();
    names.sort();
    names.into_iter().next().ok_or_else(|| RSIceError::Io {
        path: dir.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no history files"),
    })
}

/// Add the derived variables selected in `options`.
///
/// Tracers are copied before pond volume, which may need them (`alvl`, `apnd`).
pub fn add_derived(dataset: &mut Dataset, options: &HistoryOptions) -> RSIceResult<()> {
    if options.sst_above_frz {
        add_sst_above_freezing(dataset)?;
    }
    if options.snhf {
        add_net_surface_heat_flux(dataset)?;
    }
    for (source, names) in [("trcr", &options.trcr), ("trcrn", &options.trcrn)] {
        if !names.is_empty() {
            let mapping: Vec<(usize, &str)> =
                names.iter().map(|t| (t.index, t.name.as_str())).collect();
            extract_tracers(dataset, source, DIM_TRACER, &mapping)?;
        }
    }
    if options.volp {
        add_pond_volume(dataset)?;
    }
    if options.pnd_budget {
        add_pond_budget(dataset)?;
    }
    Ok(())
}

/// Load the history of `run_name`.
///
/// With no `filename` the first history file of the run is opened.
pub fn load_history(
    icepack_dirs: &Path,
    run_name: &str,
    filename: Option<&str>,
    options: &HistoryOptions,
) -> RSIceResult<Dataset> {
    let dir = history_dir(icepack_dirs, run_name);
    let filename = match filename {
        Some(name) => name.to_string(),
        None => first_history_file(&dir)?,
    };

    let mut dataset = open_dataset(&dir, &filename)?;
    add_derived(&mut dataset, options)?;
    dataset.set_attr(ATTR_RUN_NAME, run_name);

    info!(run = run_name, file = %filename, variables = dataset.len(), "Loaded history");
    Ok(dataset)
}

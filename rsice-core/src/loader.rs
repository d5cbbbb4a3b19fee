//! Opening datasets from local files.
//!
//! The format is chosen from the file extension:
//!
//! - `.nc`: NetCDF, available with the `netcdf` cargo feature
//! - `.json`: a [`Dataset`] serialised with `serde_json`
//!
//! Nothing is retried. A missing or malformed file is returned to the caller.

use crate::dataset::Dataset;
use crate::errors::{RSIceError, RSIceResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Open `filename` inside `directory`.
pub fn open_dataset(directory: impl AsRef<Path>, filename: &str) -> RSIceResult<Dataset> {
    let path = directory.as_ref().join(filename);
    open_path(&path)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether the loader knows the format of `path` from its extension.
pub fn is_supported(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some("nc") | Some("json"))
}

/// Open a dataset from a full path.
pub fn open_path(path: &Path) -> RSIceResult<Dataset> {
    let dataset = match extension_of(path).as_deref() {
        Some("nc") => read_netcdf(path)?,
        Some("json") => read_json(path)?,
        _ => return Err(RSIceError::UnsupportedFormat(path.display().to_string())),
    };

    info!(
        path = %path.display(),
        variables = dataset.len(),
        "Opened dataset"
    );
    Ok(dataset)
}

/// Write a dataset as JSON so it can be re-opened with [`open_dataset`].
pub fn write_json(dataset: &Dataset, path: &Path) -> RSIceResult<()> {
    let text = dataset.to_json()?;
    std::fs::write(path, text).map_err(|source| RSIceError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn read_json(path: &Path) -> RSIceResult<Dataset> {
    let text = std::fs::read_to_string(path).map_err(|source| RSIceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| RSIceError::MalformedDataset {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(path: &Path) -> RSIceResult<Dataset> {
    Err(RSIceError::FeatureDisabled(path.display().to_string()))
}

#[cfg(feature = "netcdf")]
fn read_netcdf(path: &Path) -> RSIceResult<Dataset> {
    netcdf_reader::read(path)
}

#[cfg(feature = "netcdf")]
mod netcdf_reader {
    use super::*;
    use crate::labeled::LabeledArray;
    use ndarray::{ArrayD, IxDyn};
    use tracing::debug;

    const FILL_ATTRS: [&str; 2] = ["_FillValue", "missing_value"];

    pub(super) fn read(path: &Path) -> RSIceResult<Dataset> {
        let malformed = |e: netcdf::Error| RSIceError::MalformedDataset {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if !path.exists() {
            return Err(RSIceError::Io {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        let file = netcdf::open(path).map_err(malformed)?;

        let mut dataset = Dataset::new();
        for attr in file.attributes() {
            if let Some(text) = attribute_text(attr.value().ok()) {
                dataset.set_attr(attr.name(), text);
            }
        }

        let mut coords: Vec<(String, Vec<f64>)> = Vec::new();
        for var in file.variables() {
            let name = var.name();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

            let mut data: Vec<f64> = match var.get_values::<f64, _>(..) {
                Ok(data) => data,
                Err(e) => {
                    // Character and string variables have no numeric view
                    debug!(variable = %name, error = %e, "Skipping non-numeric variable");
                    continue;
                }
            };
            for key in FILL_ATTRS {
                if let Some(fill) = attribute_number(&var, key) {
                    data.iter_mut().filter(|v| **v == fill).for_each(|v| *v = f64::NAN);
                }
            }

            let values = ArrayD::from_shape_vec(IxDyn(&shape), data)
                .map_err(|e| RSIceError::ShapeMismatch(format!("{}: {}", name, e)))?;
            let mut array = LabeledArray::new(name.clone(), dims.clone(), values)?;
            for attr in var.attributes() {
                if let Some(text) = attribute_text(attr.value().ok()) {
                    array.set_attr(attr.name(), text);
                }
            }

            if dims.len() == 1 && dims[0] == name {
                coords.push((name.clone(), array.to_vec1()?));
            }
            dataset.insert(array);
        }

        // Attach coordinate variables to every array that uses the dimension
        let names: Vec<String> = dataset.variable_names().map(str::to_string).collect();
        let mut updated = Vec::new();
        for name in names {
            let mut array = dataset.variable(&name)?.clone();
            for (dim, values) in &coords {
                if array.has_dim(dim) {
                    array.set_coord(dim, values.clone())?;
                }
            }
            updated.push(array);
        }
        for array in updated {
            dataset.insert(array);
        }
        Ok(dataset)
    }

    fn attribute_text(value: Option<netcdf::AttributeValue>) -> Option<String> {
        match value? {
            netcdf::AttributeValue::Str(s) => Some(s),
            netcdf::AttributeValue::Strs(s) => Some(s.join(" ")),
            netcdf::AttributeValue::Double(d) => Some(d.to_string()),
            netcdf::AttributeValue::Float(f) => Some(f.to_string()),
            netcdf::AttributeValue::Int(i) => Some(i.to_string()),
            netcdf::AttributeValue::Short(s) => Some(s.to_string()),
            _ => None,
        }
    }

    fn attribute_number(var: &netcdf::Variable, name: &str) -> Option<f64> {
        var.attribute_value(name)
            .and_then(|r| r.ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Double(d) => Some(d),
                netcdf::AttributeValue::Float(f) => Some(f as f64),
                netcdf::AttributeValue::Int(i) => Some(i as f64),
                netcdf::AttributeValue::Short(s) => Some(s as f64),
                _ => None,
            })
    }
}

/// Path of `filename` inside `directory`, as the loader would open it.
pub fn dataset_path(directory: impl AsRef<Path>, filename: &str) -> PathBuf {
    directory.as_ref().join(filename)
}

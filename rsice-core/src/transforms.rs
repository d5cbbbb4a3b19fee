//! Series transforms applied before plotting history variables.

use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::LabeledArray;
use ndarray::Slice;
use serde::{Deserialize, Serialize};

/// Resample, then accumulate, then scale, in that order.
///
/// Accumulating a flux and scaling by the step length turns a rate into a total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesTransform {
    /// Average consecutive blocks of this many steps
    pub resample: Option<usize>,
    pub cumulative: bool,
    /// Default: 1
    pub mult: f64,
}

impl Default for SeriesTransform {
    fn default() -> Self {
        Self {
            resample: None,
            cumulative: false,
            mult: 1.0,
        }
    }
}

impl SeriesTransform {
    pub fn apply(&self, array: &LabeledArray, dim: &str) -> RSIceResult<LabeledArray> {
        let mut out = match self.resample {
            Some(size) => block_mean(array, dim, size)?,
            None => array.clone(),
        };
        if self.cumulative {
            out = cumulative(&out, dim)?;
        }
        if self.mult != 1.0 {
            out = scaled(&out, self.mult);
        }
        Ok(out)
    }
}

/// Running sum along `dim`, useful for turning fluxes into totals.
pub fn cumulative(array: &LabeledArray, dim: &str) -> RSIceResult<LabeledArray> {
    let axis = array.axis(dim)?;
    let mut values = array.values().clone();
    values.accumulate_axis_inplace(axis, |&prev, curr| *curr += prev);
    rebuild(array, values)
}

/// Multiply every value by `factor`.
pub fn scaled(array: &LabeledArray, factor: f64) -> LabeledArray {
    array.map(|v| v * factor)
}

/// Average consecutive blocks of `size` steps along `dim`.
///
/// A trailing partial block is averaged over its own length. The coordinate of
/// each block is the coordinate of its first step.
pub fn block_mean(array: &LabeledArray, dim: &str, size: usize) -> RSIceResult<LabeledArray> {
    if size == 0 {
        return Err(RSIceError::Error("block size must be at least 1".to_string()));
    }
    let axis = array.axis(dim)?;
    let len = array.len_of(dim)?;
    let n_blocks = len.div_ceil(size);

    let mut shape = array.shape().to_vec();
    shape[axis.index()] = n_blocks;
    let mut values = ndarray::ArrayD::<f64>::zeros(shape);

    for block in 0..n_blocks {
        let start = block * size;
        let end = (start + size).min(len);
        let chunk = array
            .values()
            .slice_axis(axis, Slice::from(start..end));
        let mean = chunk
            .mean_axis(axis)
            .ok_or_else(|| RSIceError::Error("empty block".to_string()))?;
        values.index_axis_mut(axis, block).assign(&mean);
    }

    let starts: Vec<usize> = (0..n_blocks).map(|b| b * size).collect();
    let mut out = rebuild_dim(array, values, dim)?;
    if let Some(coord) = array.coord(dim) {
        out.set_coord(dim, starts.iter().map(|&i| coord[i]).collect())?;
    }
    Ok(out)
}

fn rebuild(array: &LabeledArray, values: ndarray::ArrayD<f64>) -> RSIceResult<LabeledArray> {
    let mut out = LabeledArray::new(array.name(), array.dims().to_vec(), values)?;
    for (dim, coord) in array.coords() {
        out.set_coord(dim, coord.clone())?;
    }
    for (key, value) in array.attrs() {
        out.set_attr(key.clone(), value.clone());
    }
    Ok(out)
}

/// Like [`rebuild`] but drops the coordinate of `changed`, whose length differs.
fn rebuild_dim(
    array: &LabeledArray,
    values: ndarray::ArrayD<f64>,
    changed: &str,
) -> RSIceResult<LabeledArray> {
    let mut out = LabeledArray::new(array.name(), array.dims().to_vec(), values)?;
    for (dim, coord) in array.coords().iter().filter(|(d, _)| *d != changed) {
        out.set_coord(dim, coord.clone())?;
    }
    for (key, value) in array.attrs() {
        out.set_attr(key.clone(), value.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: Vec<f64>) -> LabeledArray {
        let n = values.len();
        LabeledArray::from_shape_vec("flux", ["time"], &[n], values)
            .unwrap()
            .with_coord("time", (0..n).map(|i| i as f64).collect())
            .unwrap()
            .with_attr("units", "W/m^2")
    }

    #[test]
    fn cumulative_sum() {
        let out = cumulative(&series(vec![1.0, 2.0, 3.0, -1.0]), "time").unwrap();
        assert_eq!(out.to_vec1().unwrap(), vec![1.0, 3.0, 6.0, 5.0]);
        assert_eq!(out.units(), Some("W/m^2"));
        assert_eq!(out.coord("time").unwrap().len(), 4);
    }

    #[test]
    fn cumulative_along_inner_axis() {
        let arr = LabeledArray::from_shape_vec("x", ["ni", "time"], &[2, 3], vec![1.0; 6]).unwrap();
        let out = cumulative(&arr, "time").unwrap();
        assert_eq!(out.get(&[("ni", 1), ("time", 2)]).unwrap(), 3.0);
        assert_eq!(out.get(&[("ni", 0), ("time", 0)]).unwrap(), 1.0);
    }

    #[test]
    fn scaled_multiplies() {
        let out = scaled(&series(vec![1.0, -2.0]), 86_400.0);
        assert_eq!(out.to_vec1().unwrap(), vec![86_400.0, -172_800.0]);
    }

    #[test]
    fn block_mean_with_partial_tail() {
        let out = block_mean(&series(vec![1.0, 3.0, 5.0, 7.0, 10.0]), "time", 2).unwrap();
        assert_eq!(out.to_vec1().unwrap(), vec![2.0, 6.0, 10.0]);
        assert_eq!(out.coord("time").unwrap(), &[0.0, 2.0, 4.0]);
    }

    #[test]
    fn transform_order_is_resample_accumulate_scale() {
        let transform = SeriesTransform {
            resample: Some(2),
            cumulative: true,
            mult: 10.0,
        };
        let out = transform
            .apply(&series(vec![1.0, 3.0, 5.0, 7.0, 10.0]), "time")
            .unwrap();
        // Means [2, 6, 10], running total [2, 8, 18], scaled
        assert_eq!(out.to_vec1().unwrap(), vec![20.0, 80.0, 180.0]);
        assert_eq!(out.coord("time").unwrap(), &[0.0, 2.0, 4.0]);

        let identity = SeriesTransform::default();
        let input = series(vec![1.0, 2.0]);
        assert_eq!(identity.apply(&input, "time").unwrap(), input);
    }

    #[test]
    fn block_mean_rejects_zero() {
        assert!(block_mean(&series(vec![1.0]), "time", 0).is_err());
        assert!(block_mean(&series(vec![1.0]), "depth", 1).is_err());
    }
}

//! Ensemble statistics across the member axis.
//!
//! For each time step the reducer computes the mean over members and the standard
//! deviation σ, and from them the band edges mean+σ and mean−σ. All outputs keep
//! the remaining dimensions (normally just `time`) and their coordinates.
//!
//! # Standard deviation convention
//!
//! [`StdConvention::Population`] (divide by `n`) is the default, matching the
//! numerical-array default used when the field-school plots were made.
//! [`StdConvention::Sample`] divides by `n − 1`. With a single member σ is zero
//! under both conventions.
//!
//! Missing values are not masked: a NaN in any member makes that time step NaN.

use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::{FloatValue, LabeledArray};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdConvention {
    /// Divide by the member count (ddof = 0)
    #[default]
    Population,
    /// Divide by the member count minus one (ddof = 1)
    Sample,
}

impl StdConvention {
    pub fn ddof(&self) -> usize {
        match self {
            StdConvention::Population => 0,
            StdConvention::Sample => 1,
        }
    }
}

/// Statistics of an ensemble at every remaining index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleStatistics {
    pub members: usize,
    pub convention: StdConvention,
    pub mean: LabeledArray,
    pub std: LabeledArray,
    pub plus_sigma: LabeledArray,
    pub minus_sigma: LabeledArray,
}

/// Reduce `array` across `member_dim`.
///
/// # Errors
///
/// Fails if `member_dim` is not a dimension of `array` or has length zero.
///
/// # Example
///
/// ```rust
/// use rsice_core::ensemble::{ensemble_statistics, StdConvention};
/// use rsice_core::labeled::LabeledArray;
///
/// let arr = LabeledArray::from_shape_vec(
///     "aice",
///     ["n_members", "time"],
///     &[2, 2],
///     vec![1.0, 10.0, 3.0, 10.0],
/// )
/// .unwrap();
///
/// let stats = ensemble_statistics(&arr, "n_members", StdConvention::Population).unwrap();
/// assert_eq!(stats.mean.to_vec1().unwrap(), vec![2.0, 10.0]);
/// assert_eq!(stats.std.to_vec1().unwrap(), vec![1.0, 0.0]);
/// assert_eq!(stats.plus_sigma.to_vec1().unwrap(), vec![3.0, 10.0]);
/// assert_eq!(stats.minus_sigma.to_vec1().unwrap(), vec![1.0, 10.0]);
/// ```
pub fn ensemble_statistics(
    array: &LabeledArray,
    member_dim: &str,
    convention: StdConvention,
) -> RSIceResult<EnsembleStatistics> {
    let members = array.len_of(member_dim)?;
    if members == 0 {
        return Err(RSIceError::ShapeMismatch(format!(
            "'{}' has no members along '{}'",
            array.name(),
            member_dim
        )));
    }

    let ddof = convention.ddof();
    let mean = array
        .reduce(member_dim, |lane| lane_mean(&lane))?
        .renamed(format!("{}_mean", array.name()));
    let std = array
        .reduce(member_dim, |lane| lane_std(&lane, ddof))?
        .renamed(format!("{}_std", array.name()));
    let plus_sigma = mean
        .zip_with(&std, |m, s| m + s)?
        .renamed(format!("{}_plus_sigma", array.name()));
    let minus_sigma = mean
        .zip_with(&std, |m, s| m - s)?
        .renamed(format!("{}_minus_sigma", array.name()));

    debug!(
        variable = array.name(),
        members,
        convention = ?convention,
        "Computed ensemble statistics"
    );

    Ok(EnsembleStatistics {
        members,
        convention,
        mean,
        std,
        plus_sigma,
        minus_sigma,
    })
}

fn lane_mean(lane: &ArrayView1<FloatValue>) -> FloatValue {
    lane.sum() / lane.len() as FloatValue
}

fn lane_std(lane: &ArrayView1<FloatValue>, ddof: usize) -> FloatValue {
    let n = lane.len();
    if n <= ddof {
        // One member has no spread
        return if lane.iter().any(|v| v.is_nan()) {
            FloatValue::NAN
        } else {
            0.0
        };
    }
    let mean = lane_mean(lane);
    let sum_sq: FloatValue = lane.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (n - ddof) as FloatValue).sqrt()
}

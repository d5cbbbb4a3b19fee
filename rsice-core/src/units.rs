//! Area units and normalisation to square kilometres.
//!
//! Sea-ice area arrives either in square metres (raw model output) or already in
//! square kilometres. Plots and statistics are always in km².
//!
//! Two entry points exist:
//!
//! - [`scale_m2_to_km2`] multiplies by 1e-6 unconditionally. Applying it twice
//!   silently shrinks the data by another factor of a million.
//! - [`normalize_area`] consults the `units` attribute, converts only when needed
//!   and rewrites the attribute, so applying it again is a no-op.
//!
//! # Example
//!
//! ```rust
//! use rsice_core::labeled::LabeledArray;
//! use rsice_core::units::{normalize_area, AreaUnit};
//!
//! let raw = LabeledArray::from_shape_vec("aice", ["time"], &[1], vec![187_500_000_000.0])
//!     .unwrap()
//!     .with_attr("units", "m2");
//!
//! let km2 = normalize_area(&raw, None).unwrap();
//! assert_eq!(km2.to_vec1().unwrap(), vec![187_500.0]);
//! assert_eq!(km2.units(), Some(AreaUnit::SquareKilometres.symbol()));
//!
//! // Already normalised: unchanged
//! let again = normalize_area(&km2, None).unwrap();
//! assert_eq!(again.to_vec1().unwrap(), vec![187_500.0]);
//! ```

use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::{LabeledArray, UNITS_ATTR};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Factor converting square metres to square kilometres.
pub const M2_TO_KM2: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "m^2")]
    SquareMetres,
    #[serde(rename = "km^2")]
    SquareKilometres,
    #[serde(rename = "1e6 km^2")]
    MillionSquareKilometres,
}

impl AreaUnit {
    /// Parse a units string. Whitespace and exponent notation are normalised,
    /// so `m2`, `m^2`, `m**2` and `m²` all parse to square metres.
    pub fn parse(input: &str) -> Option<Self> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
            .replace('²', "2")
            .replace("**", "")
            .replace('^', "");

        match compact.as_str() {
            "m2" | "metre2" | "meter2" | "squaremeters" | "squaremetres" => {
                Some(AreaUnit::SquareMetres)
            }
            "km2" | "squarekilometers" | "squarekilometres" => Some(AreaUnit::SquareKilometres),
            "1e6km2" | "106km2" | "millionkm2" => Some(AreaUnit::MillionSquareKilometres),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AreaUnit::SquareMetres => "m^2",
            AreaUnit::SquareKilometres => "km^2",
            AreaUnit::MillionSquareKilometres => "1e6 km^2",
        }
    }

    /// Conversion factor to square metres.
    pub fn to_si_factor(&self) -> f64 {
        match self {
            AreaUnit::SquareMetres => 1.0,
            AreaUnit::SquareKilometres => 1.0e6,
            AreaUnit::MillionSquareKilometres => 1.0e12,
        }
    }

    /// Multiplier converting a value in `self` to a value in `target`.
    pub fn conversion_factor(&self, target: &AreaUnit) -> f64 {
        if self == target {
            1.0
        } else {
            self.to_si_factor() / target.to_si_factor()
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Multiply every value by [`M2_TO_KM2`] regardless of metadata.
pub fn scale_m2_to_km2(array: &LabeledArray) -> LabeledArray {
    array.map(|v| v * M2_TO_KM2)
}

/// Convert an area array to square kilometres using its `units` attribute.
///
/// `assumed` supplies the unit when the attribute is missing. With neither, the
/// data is taken to be in km² already. An attribute that is not an area unit is
/// an error.
pub fn normalize_area(array: &LabeledArray, assumed: Option<AreaUnit>) -> RSIceResult<LabeledArray> {
    let unit = match array.units() {
        Some(text) => AreaUnit::parse(text).ok_or_else(|| {
            RSIceError::WrongUnits("an area unit (m^2, km^2)".to_string(), text.to_string())
        })?,
        None => match assumed {
            Some(unit) => unit,
            None => {
                warn!(
                    variable = array.name(),
                    "No units attribute and no override; assuming km^2"
                );
                AreaUnit::SquareKilometres
            }
        },
    };

    let target = AreaUnit::SquareKilometres;
    let factor = unit.conversion_factor(&target);
    debug!(variable = array.name(), from = %unit, to = %target, factor, "Normalising area units");

    let mut converted = if factor == 1.0 {
        array.clone()
    } else {
        array.map(|v| v * factor)
    };
    converted.set_attr(UNITS_ATTR, target.symbol());
    Ok(converted)
}

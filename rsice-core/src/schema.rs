//! Names the CESM sea-ice ensemble files are published with.
//!
//! These are a contract with the data provider rather than configuration: the
//! variable and axis names below are the literal names found in the files used
//! by the field school, and the two [`DataConvention`]s describe how each file
//! lays out its month information.
//!
//! # Conventions
//!
//! - [`DataConvention::MonthIndexed`]: `aice_monthly(n_members, time, nmonth)`, where
//!   `time` counts years and `nmonth` is a 0-based month-of-year index.
//! - [`DataConvention::CalendarTime`]: `aice_monthly(member_id, time)`, where `time`
//!   is a CF-encoded monthly axis and months are matched on the decoded calendar.
//!
//! The asymmetry is intentional: comparing the two datasets requires the reader to
//! pick the right selection method for each.

use crate::labeled::UNITS_ATTR;
use crate::selection::{Month, MonthSelector, TimeStamps};
use serde::{Deserialize, Serialize};

/// Definition of a variable with its expected metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Name of the variable in the file
    pub name: &'static str,
    /// Units the variable is expected to carry when the file does not say
    pub unit: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// Monthly Northern Hemisphere sea-ice area.
pub const VAR_AICE_MONTHLY: VariableDefinition = VariableDefinition {
    name: "aice_monthly",
    unit: "m^2",
    description: "Monthly-mean sea-ice area",
};

pub const DIM_N_MEMBERS: &str = "n_members";
pub const DIM_MEMBER_ID: &str = "member_id";
pub const DIM_NMONTH: &str = "nmonth";
pub const DIM_TIME: &str = "time";

/// Optional coordinate on the time axis carrying the calendar month (1-12).
pub const COORD_MONTH: &str = "month";

pub const ATTR_UNITS: &str = UNITS_ATTR;
pub const ATTR_CALENDAR: &str = "calendar";

/// How a dataset encodes month-of-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataConvention {
    /// Positional month index on a separate `nmonth` axis
    MonthIndexed,
    /// Calendar month matched on a CF time axis
    CalendarTime,
}

impl DataConvention {
    /// Dimension holding the ensemble members.
    pub fn member_dim(&self) -> &'static str {
        match self {
            DataConvention::MonthIndexed => DIM_N_MEMBERS,
            DataConvention::CalendarTime => DIM_MEMBER_ID,
        }
    }

    pub fn time_dim(&self) -> &'static str {
        DIM_TIME
    }

    /// The selector this convention uses to pick out `month`.
    ///
    /// `stamps` only matters for [`DataConvention::CalendarTime`].
    pub fn selector(&self, month: Month, stamps: TimeStamps) -> MonthSelector {
        match self {
            DataConvention::MonthIndexed => MonthSelector::Index(month.zero_based()),
            DataConvention::CalendarTime => MonthSelector::Calendar(month, stamps),
        }
    }
}

impl std::fmt::Display for DataConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataConvention::MonthIndexed => write!(f, "month-indexed"),
            DataConvention::CalendarTime => write!(f, "calendar-time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventions_use_different_member_axes() {
        assert_eq!(DataConvention::MonthIndexed.member_dim(), "n_members");
        assert_eq!(DataConvention::CalendarTime.member_dim(), "member_id");
        assert_eq!(DataConvention::CalendarTime.time_dim(), "time");
    }

    #[test]
    fn september_selectors() {
        let september = Month::new(9).unwrap();
        assert_eq!(
            DataConvention::MonthIndexed.selector(september, TimeStamps::BoundsMidpoint),
            MonthSelector::Index(8)
        );
        assert_eq!(
            DataConvention::CalendarTime.selector(september, TimeStamps::AsStored),
            MonthSelector::Calendar(september, TimeStamps::AsStored)
        );
    }

    #[test]
    fn convention_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            convention: DataConvention,
        }
        let w: Wrapper = toml::from_str("convention = \"calendar-time\"").unwrap();
        assert_eq!(w.convention, DataConvention::CalendarTime);
        assert_eq!(DataConvention::MonthIndexed.to_string(), "month-indexed");
    }
}

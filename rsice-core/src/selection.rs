//! Calendar-month selection.
//!
//! Two selection methods exist because the field-school datasets store month
//! information differently (see [`crate::schema::DataConvention`]):
//!
//! - [`MonthSelector::Index`] picks a 0-based position on the `nmonth` axis and drops
//!   that axis.
//! - [`MonthSelector::Calendar`] decodes the CF `time` axis and keeps only the steps
//!   that fall in the requested calendar month. The returned `time` coordinate holds
//!   the calendar year of each kept step.
//!
//! Neither method converts units or shifts calendars.

use crate::calendar::{CalendarDate, TimeEncoding};
use crate::dataset::Dataset;
use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::LabeledArray;
use crate::schema::{ATTR_CALENDAR, ATTR_UNITS, COORD_MONTH, DIM_NMONTH, DIM_TIME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar month, 1 (January) to 12 (December).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Month(u32);

impl Month {
    pub fn new(month: u32) -> RSIceResult<Self> {
        if (1..=12).contains(&month) {
            Ok(Self(month))
        } else {
            Err(RSIceError::InvalidMonth(month))
        }
    }

    /// Resolve an optional month setting. Unset is an error, never a default.
    pub fn required(month: Option<u32>) -> RSIceResult<Self> {
        month.ok_or(RSIceError::MonthNotSet).and_then(Self::new)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn zero_based(&self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[self.zero_based()]
    }
}

impl TryFrom<u32> for Month {
    type Error = RSIceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Month::new(value)
    }
}

impl From<Month> for u32 {
    fn from(month: Month) -> u32 {
        month.0
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which instant of each averaging period the calendar method matches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeStamps {
    /// The `time` values as stored in the file
    #[default]
    AsStored,
    /// Midpoints of the interval named by the `bounds` attribute of `time`.
    /// CESM stamps monthly means at the end of the averaging period, which
    /// otherwise labels each mean with the following month.
    BoundsMidpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthSelector {
    /// 0-based month-of-year position on the `nmonth` axis
    Index(usize),
    /// Calendar month matched on the decoded `time` axis
    Calendar(Month, TimeStamps),
}

/// Select a month from `variable` in `dataset`.
///
/// The calendar method reads the dataset's `time` coordinate variable for its
/// `units` and `calendar` attributes.
pub fn select_month(
    dataset: &Dataset,
    variable: &str,
    selector: MonthSelector,
) -> RSIceResult<LabeledArray> {
    let array = dataset.variable(variable)?;
    match selector {
        MonthSelector::Index(index) => select_month_index(array, index),
        MonthSelector::Calendar(month, stamps) => {
            let dates = decode_time_axis(dataset, array, stamps)?;
            select_calendar_month(array, &dates, month)
        }
    }
}

/// Positional selection on the `nmonth` axis.
pub fn select_month_index(array: &LabeledArray, index: usize) -> RSIceResult<LabeledArray> {
    debug!(variable = array.name(), index, "Selecting month by index");
    array.isel(DIM_NMONTH, index)
}

/// Keep the steps of `array`'s `time` axis that fall in `month`.
///
/// `dates` must hold one decoded date per time step. Every year present in the
/// selection must contribute exactly one step.
pub fn select_calendar_month(
    array: &LabeledArray,
    dates: &[CalendarDate],
    month: Month,
) -> RSIceResult<LabeledArray> {
    let len = array.len_of(DIM_TIME)?;
    if dates.len() != len {
        return Err(RSIceError::ShapeMismatch(format!(
            "{} decoded dates for a time axis of length {}",
            dates.len(),
            len
        )));
    }

    let indices: Vec<usize> = dates
        .iter()
        .enumerate()
        .filter(|(_, d)| d.month == month.number())
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        return Err(RSIceError::MonthNotFound(month.name().to_string()));
    }

    let years: Vec<i32> = indices.iter().map(|&i| dates[i].year).collect();
    let mut per_year: BTreeMap<i32, usize> = BTreeMap::new();
    for year in &years {
        *per_year.entry(*year).or_default() += 1;
    }
    if let Some((&year, &count)) = per_year.iter().find(|(_, &count)| count > 1) {
        return Err(RSIceError::AmbiguousMonthSelection { year, count });
    }
    // Every year between the first and last match must contribute a step
    if let (Some(&first), Some(&last)) = (per_year.keys().next(), per_year.keys().next_back()) {
        if let Some(year) = (first..=last).find(|y| !per_year.contains_key(y)) {
            return Err(RSIceError::MonthMissing {
                month: month.name().to_string(),
                year,
            });
        }
    }

    debug!(
        variable = array.name(),
        month = month.number(),
        steps = indices.len(),
        "Selecting month by calendar"
    );
    let mut selected = array.select(DIM_TIME, &indices)?;
    selected.set_coord(DIM_TIME, years.iter().map(|&y| y as f64).collect())?;
    Ok(selected)
}

/// Decode the dates of `array`'s time axis.
///
/// A `month` variable along `time` takes precedence over decoding. Otherwise the
/// `time` variable is decoded with its `units` and `calendar` attributes, at the
/// instants chosen by `stamps`.
pub fn decode_time_axis(
    dataset: &Dataset,
    array: &LabeledArray,
    stamps: TimeStamps,
) -> RSIceResult<Vec<CalendarDate>> {
    let len = array.len_of(DIM_TIME)?;

    if let Ok(months) = dataset.variable(COORD_MONTH) {
        if months.dims() == [DIM_TIME] {
            return months_as_dates(array, months);
        }
    }

    let time = dataset.variable(DIM_TIME)?;
    let units = time
        .attr(ATTR_UNITS)
        .ok_or_else(|| RSIceError::TimeDecoding("time variable has no units".to_string()))?;
    let encoding = TimeEncoding::parse(units, time.attr(ATTR_CALENDAR))?;

    let values = match stamps {
        TimeStamps::AsStored => time.to_vec1()?,
        TimeStamps::BoundsMidpoint => bounds_midpoints(dataset, time, len)?,
    };
    if values.len() != len {
        return Err(RSIceError::ShapeMismatch(format!(
            "time variable has {} values, '{}' has {} time steps",
            values.len(),
            array.name(),
            len
        )));
    }
    encoding.decode_all(&values)
}

fn bounds_midpoints(dataset: &Dataset, time: &LabeledArray, len: usize) -> RSIceResult<Vec<f64>> {
    let name = time.attr("bounds").ok_or_else(|| {
        RSIceError::TimeDecoding("time variable has no bounds attribute".to_string())
    })?;
    let bounds = dataset.variable(name)?;
    if bounds.shape() != [len, 2] {
        return Err(RSIceError::ShapeMismatch(format!(
            "bounds variable '{}' has shape {:?}, expected [{}, 2]",
            name,
            bounds.shape(),
            len
        )));
    }
    Ok(bounds
        .values()
        .rows()
        .into_iter()
        .map(|row| 0.5 * row.sum())
        .collect())
}

fn months_as_dates(array: &LabeledArray, months: &LabeledArray) -> RSIceResult<Vec<CalendarDate>> {
    let len = array.len_of(DIM_TIME)?;
    let months = months.to_vec1()?;
    if months.len() != len {
        return Err(RSIceError::ShapeMismatch(format!(
            "'{}' has {} values, '{}' has {} time steps",
            COORD_MONTH,
            months.len(),
            array.name(),
            len
        )));
    }
    if let Some((i, m)) = months
        .iter()
        .enumerate()
        .find(|(_, m)| !(m.is_finite() && m.fract() == 0.0))
    {
        return Err(RSIceError::TimeDecoding(format!(
            "'{}' value {} at step {} is not a whole month number",
            COORD_MONTH, m, i
        )));
    }

    let years = array.coord(DIM_TIME);
    months
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            // Whole numbers by now; the cast saturates negatives to 0
            let month = Month::new(m as u32)?;
            // Without a year coordinate, count years from each January seen
            let year = match years {
                Some(y) => y[i].floor() as i32,
                None => months[..=i].iter().filter(|&&v| v == 1.0).count() as i32,
            };
            Ok(CalendarDate::new(year, month.number(), 1))
        })
        .collect()
}

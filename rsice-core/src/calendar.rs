//! Decoding of CF-convention time coordinates.
//!
//! NetCDF time axes are stored as numbers relative to a reference date, e.g.
//! `units = "days since 1850-01-01 00:00:00"` with `calendar = "noleap"`. CESM output
//! uses the `noleap` calendar, so Gregorian date arithmetic cannot be applied blindly.
//!
//! Supported calendars:
//!
//! | Attribute value | Year length |
//! |-----------------|-------------|
//! | `standard`, `gregorian`, `proleptic_gregorian` | proleptic Gregorian (via `chrono`) |
//! | `noleap`, `365_day` | 365 days |
//! | `all_leap`, `366_day` | 366 days |
//! | `360_day` | 12 months of 30 days |

use crate::errors::{RSIceError, RSIceResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

const NOLEAP_MONTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP_MONTHS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAY_360_MONTHS: [u32; 12] = [30; 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calendar {
    Standard,
    NoLeap,
    AllLeap,
    Day360,
}

impl Calendar {
    /// Parse a CF `calendar` attribute. A missing attribute means `standard`.
    pub fn parse(value: Option<&str>) -> RSIceResult<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("standard") | Some("gregorian") | Some("proleptic_gregorian") => {
                Ok(Calendar::Standard)
            }
            Some("noleap") | Some("365_day") => Ok(Calendar::NoLeap),
            Some("all_leap") | Some("366_day") => Ok(Calendar::AllLeap),
            Some("360_day") => Ok(Calendar::Day360),
            Some(other) => Err(RSIceError::TimeDecoding(format!(
                "unsupported calendar '{}'",
                other
            ))),
        }
    }

    fn month_lengths(&self) -> Option<&'static [u32; 12]> {
        match self {
            Calendar::Standard => None,
            Calendar::NoLeap => Some(&NOLEAP_MONTHS),
            Calendar::AllLeap => Some(&ALL_LEAP_MONTHS),
            Calendar::Day360 => Some(&DAY_360_MONTHS),
        }
    }
}

/// A decoded calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl std::fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// The `<unit> since <reference>` encoding of a time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEncoding {
    unit_seconds: f64,
    reference: CalendarDate,
    reference_seconds: f64,
    calendar: Calendar,
}

impl TimeEncoding {
    /// Parse the `units` and `calendar` attributes of a time coordinate.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rsice_core::calendar::{CalendarDate, TimeEncoding};
    ///
    /// let enc = TimeEncoding::parse("days since 1850-01-01 00:00:00", Some("noleap")).unwrap();
    /// // 365 noleap days after the reference is exactly one year later
    /// assert_eq!(enc.decode(365.0).unwrap(), CalendarDate::new(1851, 1, 1));
    /// ```
    pub fn parse(units: &str, calendar: Option<&str>) -> RSIceResult<Self> {
        let calendar = Calendar::parse(calendar)?;
        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| RSIceError::TimeDecoding(format!("'{}' has no 'since'", units)))?;

        let unit_seconds = match unit.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => SECONDS_PER_DAY,
            "hours" | "hour" | "hr" | "h" => 3_600.0,
            "minutes" | "minute" | "min" => 60.0,
            "seconds" | "second" | "sec" | "s" => 1.0,
            other => {
                return Err(RSIceError::TimeDecoding(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        let (reference, reference_seconds) = parse_reference(reference.trim())?;
        if reference.month == 0
            || reference.month > 12
            || reference.day == 0
            || reference.day > 31
        {
            return Err(RSIceError::TimeDecoding(format!(
                "invalid reference date {}",
                reference
            )));
        }

        Ok(Self {
            unit_seconds,
            reference,
            reference_seconds,
            calendar,
        })
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Length in seconds of `span` units of this axis.
    pub fn seconds(&self, span: f64) -> f64 {
        span * self.unit_seconds
    }

    pub fn decode(&self, value: f64) -> RSIceResult<CalendarDate> {
        if !value.is_finite() {
            return Err(RSIceError::TimeDecoding(format!(
                "non-finite time value {}",
                value
            )));
        }
        let offset_seconds = value * self.unit_seconds + self.reference_seconds;
        match self.calendar.month_lengths() {
            None => self.decode_gregorian(offset_seconds),
            Some(lengths) => Ok(self.decode_fixed(offset_seconds, lengths)),
        }
    }

    pub fn decode_all(&self, values: &[f64]) -> RSIceResult<Vec<CalendarDate>> {
        values.iter().map(|&v| self.decode(v)).collect()
    }

    fn decode_gregorian(&self, offset_seconds: f64) -> RSIceResult<CalendarDate> {
        let date = NaiveDate::from_ymd_opt(
            self.reference.year,
            self.reference.month,
            self.reference.day,
        )
        .ok_or_else(|| {
            RSIceError::TimeDecoding(format!("invalid reference date {}", self.reference))
        })?;
        let start = NaiveDateTime::new(date, NaiveTime::MIN);
        let delta = TimeDelta::try_milliseconds((offset_seconds * 1_000.0).round() as i64)
            .ok_or_else(|| {
                RSIceError::TimeDecoding(format!("offset of {}s is out of range", offset_seconds))
            })?;
        let decoded = start.checked_add_signed(delta).ok_or_else(|| {
            RSIceError::TimeDecoding(format!("offset of {}s is out of range", offset_seconds))
        })?;
        Ok(CalendarDate::new(
            decoded.year(),
            decoded.month(),
            decoded.day(),
        ))
    }

    fn decode_fixed(&self, offset_seconds: f64, lengths: &[u32; 12]) -> CalendarDate {
        let year_length: i64 = lengths.iter().map(|&l| l as i64).sum();
        let reference_doy: i64 = lengths[..(self.reference.month - 1) as usize]
            .iter()
            .map(|&l| l as i64)
            .sum::<i64>()
            + (self.reference.day as i64 - 1).min(lengths[(self.reference.month - 1) as usize] as i64 - 1);

        let offset_days = (offset_seconds / SECONDS_PER_DAY).floor() as i64;
        let absolute = self.reference.year as i64 * year_length + reference_doy + offset_days;
        let year = absolute.div_euclid(year_length);
        let mut doy = absolute.rem_euclid(year_length);

        let mut month = 1;
        for &len in lengths.iter() {
            if doy < len as i64 {
                break;
            }
            doy -= len as i64;
            month += 1;
        }
        CalendarDate::new(year as i32, month, doy as u32 + 1)
    }
}

/// Parse `YYYY-MM-DD[ HH:MM:SS]` or `YYYY-MM-DDTHH:MM:SS`.
fn parse_reference(text: &str) -> RSIceResult<(CalendarDate, f64)> {
    let invalid = || RSIceError::TimeDecoding(format!("cannot parse reference date '{}'", text));

    let mut parts = text.splitn(2, |c: char| c == ' ' || c == 'T');
    let date = parts.next().ok_or_else(invalid)?;
    let time = parts.next().map(str::trim).unwrap_or("");

    let mut fields = date.splitn(3, '-');
    let year: i32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let month: u32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let day: u32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;

    let mut seconds = 0.0;
    // Drop any timezone suffix such as "Z" or "+00:00"
    let time = time
        .trim_end_matches('Z')
        .split(|c: char| c == '+' || c == ' ')
        .next()
        .unwrap_or("");
    if !time.is_empty() {
        let mut hms = time.split(':');
        let h: f64 = hms.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let m: f64 = hms.next().map(|v| v.parse().ok()).unwrap_or(Some(0.0)).ok_or_else(invalid)?;
        let s: f64 = hms.next().map(|v| v.parse().ok()).unwrap_or(Some(0.0)).ok_or_else(invalid)?;
        seconds = h * 3_600.0 + m * 60.0 + s;
    }
    Ok((CalendarDate::new(year, month, day), seconds))
}

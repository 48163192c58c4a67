//! Calendar building blocks: time of day, yearly month/day and weekday sets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Last representable instant of a calendar day.
pub(crate) fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or_default()
}

/// Attach `tz` to a local wall-clock time.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap are pushed forward by an hour. `fallback` is returned only if the
/// zone rejects both.
pub(crate) fn localize(tz: &Tz, naive: NaiveDateTime, fallback: &DateTime<Tz>) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| fallback.clone())
}

// ── TimeOfDay ─────────────────────────────────────────────────

/// Minute-precision wall-clock time, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::TimeOfDay(format!("{hour}:{minute}")));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Truncate a wall-clock time to the minute.
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour as u32
    }

    pub fn minute(&self) -> u32 {
        self.minute as u32
    }

    pub fn is_midnight(&self) -> bool {
        *self == Self::MIDNIGHT
    }

    /// The time as the opening bound of a window.
    pub fn as_start(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or_default()
    }

    /// The time as the closing bound of a window. `00:00` closes at the end
    /// of the calendar day, so `00:00`-`00:00` covers a whole day.
    pub fn as_end(&self) -> NaiveTime {
        if self.is_midnight() {
            end_of_day()
        } else {
            self.as_start()
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ScheduleError::TimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hour: u32 = h.parse().map_err(|_| err())?;
        let minute: u32 = m.parse().map_err(|_| err())?;
        Self::new(hour, minute).map_err(|_| err())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

// ── MonthDay ──────────────────────────────────────────────────

/// A yearly-recurring calendar day, written `MM/DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u8,
    day: u8,
}

impl MonthDay {
    pub const NEW_YEAR: MonthDay = MonthDay { month: 1, day: 1 };

    pub fn new(month: u32, day: u32) -> Result<Self, ScheduleError> {
        // 2000 is a leap year, so 02/29 is accepted.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(ScheduleError::MonthDay(format!("{month}/{day}")));
        }
        Ok(Self {
            month: month as u8,
            day: day as u8,
        })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }

    /// This month/day in `year`. `02/29` falls back to `02/28` outside leap years.
    pub fn on_year(&self, year: i32) -> NaiveDate {
        let (m, d) = (self.month as u32, self.day as u32);
        NaiveDate::from_ymd_opt(year, m, d)
            .or_else(|| NaiveDate::from_ymd_opt(year, m, d - 1))
            .unwrap_or_default()
    }
}

impl FromStr for MonthDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ScheduleError::MonthDay(s.to_string());
        let (m, d) = s.trim().split_once('/').ok_or_else(err)?;
        let month: u32 = m.parse().map_err(|_| err())?;
        let day: u32 = d.parse().map_err(|_| err())?;
        Self::new(month, day).map_err(|_| err())
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

impl TryFrom<String> for MonthDay {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

// ── Weekdays ──────────────────────────────────────────────────

const WEEKDAY_CODES: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const ALL_DAYS: u8 = 0b111_1111;

/// Set of weekdays an interval applies on.
///
/// Written as two-letter codes (`MoTuWeTh`); `*` or an empty string means
/// every day. Codes are matched as substrings, so separators and longer
/// spellings such as `Mon,Tue` are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Weekdays(u8);

impl Weekdays {
    pub const EVERY_DAY: Weekdays = Weekdays(ALL_DAYS);

    pub fn from_days(days: &[Weekday]) -> Self {
        Self(
            days.iter()
                .fold(0u8, |bits, day| bits | (1 << day.num_days_from_monday())),
        )
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_every_day(&self) -> bool {
        self.0 == ALL_DAYS
    }

    pub(crate) fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for Weekdays {
    fn default() -> Self {
        Self::EVERY_DAY
    }
}

impl FromStr for Weekdays {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::EVERY_DAY);
        }

        let bits = WEEKDAY_CODES
            .iter()
            .enumerate()
            .filter(|(_, code)| trimmed.contains(*code))
            .fold(0u8, |bits, (i, _)| bits | (1 << i));

        if bits == 0 {
            return Err(ScheduleError::Weekdays(s.to_string()));
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_every_day() {
            return write!(f, "*");
        }
        for (i, code) in WEEKDAY_CODES.iter().enumerate() {
            if self.0 & (1 << i) != 0 {
                f.write_str(code)?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for Weekdays {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Weekdays> for String {
    fn from(value: Weekdays) -> Self {
        value.to_string()
    }
}

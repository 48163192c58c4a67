//! [`Interval`] data and construction.

use std::fmt;

use hashctl_core::{IntervalId, Uuid};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::limit::PerformanceLimit;
use crate::window::{MonthDay, TimeOfDay, Weekdays};

fn default_true() -> bool {
    true
}

fn default_month_day() -> MonthDay {
    MonthDay::NEW_YEAR
}

/// A rule describing when hashing is on or off, at what price and power target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default = "Uuid::new_v4")]
    pub id: IntervalId,
    #[serde(default)]
    pub name: Option<String>,

    pub daytime_start: TimeOfDay,
    pub daytime_end: TimeOfDay,

    /// Yearly date range; `start == end` covers the whole year.
    #[serde(default = "default_month_day")]
    pub date_start: MonthDay,
    #[serde(default = "default_month_day")]
    pub date_end: MonthDay,

    #[serde(default)]
    pub weekdays: Weekdays,
    pub hashing_enabled: bool,

    #[serde(default)]
    pub price_per_kwh: Option<f64>,

    /// Inclusive ambient temperature bounds (°C); unset means unbounded.
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,

    /// Priority within a schedule; lower runs first.
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub performance_limit: Option<PerformanceLimit>,
}

impl Interval {
    /// An active, year-round, every-day window.
    pub fn new(daytime_start: TimeOfDay, daytime_end: TimeOfDay, hashing_enabled: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            daytime_start,
            daytime_end,
            date_start: MonthDay::NEW_YEAR,
            date_end: MonthDay::NEW_YEAR,
            weekdays: Weekdays::EVERY_DAY,
            hashing_enabled,
            price_per_kwh: None,
            temp_min: None,
            temp_max: None,
            order: 0,
            is_active: true,
            performance_limit: None,
        }
    }

    /// Parse `HH:MM` bounds into a year-round, every-day window.
    pub fn daily(start: &str, end: &str, hashing_enabled: bool) -> Result<Self, ScheduleError> {
        Ok(Self::new(start.parse()?, end.parse()?, hashing_enabled))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dates(mut self, start: MonthDay, end: MonthDay) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn with_weekdays(mut self, weekdays: Weekdays) -> Self {
        self.weekdays = weekdays;
        self
    }

    pub fn with_price(mut self, price_per_kwh: f64) -> Self {
        self.price_per_kwh = Some(price_per_kwh);
        self
    }

    pub fn with_temperature_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.temp_min = min;
        self.temp_max = max;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: PerformanceLimit) -> Self {
        self.performance_limit = Some(limit);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn power_limit(&self) -> Option<u32> {
        self.performance_limit.as_ref().and_then(|l| l.power_limit)
    }

    /// Label for logs and summaries: the name, or the id when unnamed.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if let (Some(min), Some(max)) = (self.temp_min, self.temp_max) {
            if min > max {
                return Err(ScheduleError::TemperatureBounds { min, max });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Interval \"{}\" {} {}-{} {}-{} {}{}>",
            self.label(),
            if self.hashing_enabled { "ON" } else { "OFF" },
            self.date_start,
            self.date_end,
            self.daytime_start,
            self.daytime_end,
            self.weekdays,
            if self.is_active { "" } else { " [inactive]" },
        )
    }
}

//! [`Schedule`]: an ordered set of intervals in one timezone.

use std::cmp::Ordering;

use chrono_tz::Tz;
use hashctl_core::{IntervalId, ScheduleId, Uuid};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::interval::Interval;
use crate::scenario::Scenario;

/// Parse an IANA timezone name. An absent or empty name means UTC.
pub fn parse_timezone(name: Option<&str>) -> Result<Tz, ScheduleError> {
    match name.map(str::trim) {
        None | Some("") => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ScheduleError::Timezone(name.to_string())),
    }
}

/// Priority order of intervals within a schedule.
///
/// Inactive intervals sort last. Active ones sort by `order`, then by date
/// range, daily window and weekday set, and finally by id so that the
/// result never depends on insertion order.
pub fn interval_order(a: &Interval, b: &Interval) -> Ordering {
    b.is_active
        .cmp(&a.is_active)
        .then_with(|| a.order.cmp(&b.order))
        .then_with(|| a.date_start.cmp(&b.date_start))
        .then_with(|| a.date_end.cmp(&b.date_end))
        .then_with(|| a.daytime_start.cmp(&b.daytime_start))
        .then_with(|| a.daytime_end.cmp(&b.daytime_end))
        .then_with(|| a.weekdays.bits().cmp(&b.weekdays.bits()))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleDef")]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: Option<String>,
    pub timezone: Tz,
    intervals: Vec<Interval>,
}

/// Wire shape of a schedule before validation.
#[derive(Deserialize)]
struct ScheduleDef {
    #[serde(default = "Uuid::new_v4")]
    id: ScheduleId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    intervals: Vec<Interval>,
}

impl TryFrom<ScheduleDef> for Schedule {
    type Error = ScheduleError;

    fn try_from(def: ScheduleDef) -> Result<Self, Self::Error> {
        let timezone = parse_timezone(def.timezone.as_deref())?;
        for interval in &def.intervals {
            interval.validate()?;
        }
        let mut schedule = Schedule::new(def.name, timezone, def.intervals);
        schedule.id = def.id;
        Ok(schedule)
    }
}

impl Schedule {
    pub fn new(name: Option<String>, timezone: Tz, intervals: Vec<Interval>) -> Self {
        let mut schedule = Self {
            id: Uuid::new_v4(),
            name,
            timezone,
            intervals,
        };
        schedule.sort();
        schedule
    }

    /// Intervals in priority order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn push(&mut self, interval: Interval) {
        self.intervals.push(interval);
        self.sort();
    }

    pub fn remove(&mut self, id: IntervalId) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        Some(self.intervals.remove(pos))
    }

    pub fn find(&self, id: IntervalId) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.id == id)
    }

    /// First interval, in priority order, that applies under `scenario`.
    pub fn active_interval(&self, scenario: &Scenario) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.is_active_under(scenario))
    }

    fn sort(&mut self) {
        self.intervals.sort_by(interval_order);
    }
}

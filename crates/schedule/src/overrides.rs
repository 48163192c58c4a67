//! Operator overrides: short-lived intervals that take precedence over a
//! device's schedule.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::limit::PerformanceLimit;
use crate::scenario::Scenario;
use crate::window::{localize, MonthDay, TimeOfDay, Weekdays};

/// Maximum length of one daily override window.
pub const MAX_OVERRIDE_HOURS: u32 = 24;
/// Maximum number of days an override can repeat for.
pub const MAX_OVERRIDE_DAYS: u32 = 366;

/// An override interval bounded by absolute creation and expiry instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub interval: Interval,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Override {
    pub fn is_current(&self, moment: &DateTime<Tz>) -> bool {
        let moment = moment.with_timezone(&Utc);
        self.created_at <= moment && moment < self.expires_at
    }

    pub fn is_active_under(&self, scenario: &Scenario) -> bool {
        self.is_current(&scenario.moment) && self.interval.is_active_under(scenario)
    }
}

/// Operator request for an override. Unset fields are derived from the
/// interval the schedule would apply right now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    #[serde(default)]
    pub hashing: Option<bool>,
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub power_limit: Option<u32>,
}

impl OverrideRequest {
    /// Build the override starting at `now`.
    ///
    /// `scheduled` is the schedule-only interval active at `now`, if any.
    /// A derived duration is never shorter than `min_hours`.
    pub fn build(&self, scheduled: Option<&Interval>, now: &DateTime<Tz>, min_hours: u32) -> Override {
        let tz = now.timezone();
        let local = now.naive_local();
        let today = local.date();
        let start = TimeOfDay::from_time(local.time());

        let hashing = self
            .hashing
            .unwrap_or_else(|| scheduled.map_or(true, |i| i.hashing_enabled));
        let days = self.days.unwrap_or(1).clamp(1, MAX_OVERRIDE_DAYS);

        let hours = self
            .hours
            .or_else(|| {
                if days != 1 {
                    return None;
                }
                let remaining = scheduled?.next_end_time(now) - now.clone();
                let secs = remaining.num_seconds();
                if secs <= 0 {
                    return None;
                }
                let hours = u32::try_from((secs + 3599) / 3600).unwrap_or(MAX_OVERRIDE_HOURS);
                Some(hours.max(min_hours))
            })
            .map(|h| h.clamp(1, MAX_OVERRIDE_HOURS));

        let end = match hours {
            Some(MAX_OVERRIDE_HOURS) => start,
            Some(h) => TimeOfDay::from_time(start.as_start() + Duration::hours(i64::from(h))),
            None => TimeOfDay::MIDNIGHT,
        };

        let last_day = today + Duration::days(i64::from(days) - 1);
        let opened = localize(&tz, today.and_time(start.as_start()), now);
        let expires = match hours {
            Some(h) => {
                localize(&tz, last_day.and_time(start.as_start()), now) + Duration::hours(i64::from(h))
            }
            None => {
                let next = last_day + Duration::days(1);
                localize(&tz, next.and_time(NaiveTime::MIN), now)
            }
        };

        let performance_limit = match self.power_limit {
            Some(watts) => Some(PerformanceLimit::with_power_limit(watts)),
            None => scheduled.and_then(|i| i.performance_limit.clone()),
        };

        let mut interval = Interval::new(start, end, hashing)
            .named("override")
            .with_dates(MonthDay::from_date(today), MonthDay::from_date(last_day))
            .with_weekdays(Weekdays::EVERY_DAY)
            .with_order(i32::MIN);
        interval.price_per_kwh = scheduled.and_then(|i| i.price_per_kwh);
        interval.performance_limit = performance_limit;

        Override {
            interval,
            created_at: opened.with_timezone(&Utc),
            expires_at: expires.with_timezone(&Utc),
        }
    }
}

//! Activity evaluation for [`Interval`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use tracing::debug;

use crate::scenario::Scenario;
use crate::window::{end_of_day, localize};

use super::model::Interval;

impl Interval {
    /// `00:00`-`00:00`: the window covers every time of day.
    pub fn is_all_day(&self) -> bool {
        self.daytime_start.is_midnight() && self.daytime_end.is_midnight()
    }

    /// Whether the daily window runs past midnight into the next day.
    pub fn wraps_midnight(&self) -> bool {
        !self.daytime_end.is_midnight() && self.daytime_start >= self.daytime_end
    }

    /// The date on which the daily window containing `local` opened, or
    /// `None` when `local` is outside the window.
    fn window_anchor(&self, local: NaiveDateTime) -> Option<NaiveDate> {
        let t = local.time();
        let d = local.date();
        let start = self.daytime_start.as_start();

        if self.wraps_midnight() {
            if t >= start {
                Some(d)
            } else if t < self.daytime_end.as_start() {
                d.pred_opt()
            } else {
                None
            }
        } else if t < start || t >= self.daytime_end.as_end() {
            None
        } else {
            Some(d)
        }
    }

    /// Resolve the yearly date range around `on`.
    ///
    /// The start takes `on`'s year and rolls back a year if that lands after
    /// `on`. The end takes the resolved start's year and rolls forward a year
    /// if it does not land after the start. Both bounds are inclusive.
    pub fn date_range(&self, on: NaiveDate) -> (NaiveDate, NaiveDate) {
        let mut start = self.date_start.on_year(on.year());
        if start > on {
            start = self.date_start.on_year(on.year() - 1);
        }

        let mut end = self.date_end.on_year(start.year());
        if end <= start {
            end = self.date_end.on_year(start.year() + 1);
        }

        (start, end)
    }

    pub fn is_active_at(&self, moment: &DateTime<Tz>) -> bool {
        if !self.is_active {
            return false;
        }

        let local = moment.naive_local();
        let anchor = match self.window_anchor(local) {
            Some(d) => d,
            None => {
                debug!(
                    interval = %self.label(),
                    %moment,
                    start = %self.daytime_start,
                    end = %self.daytime_end,
                    "out of time window"
                );
                return false;
            }
        };

        let (date_start, date_end) = self.date_range(anchor);
        if anchor < date_start || anchor > date_end {
            debug!(
                interval = %self.label(),
                %moment,
                %date_start,
                %date_end,
                "out of date window"
            );
            return false;
        }

        if !self.weekdays.contains(anchor.weekday()) {
            debug!(interval = %self.label(), %moment, weekdays = %self.weekdays, "not an active day");
            return false;
        }

        true
    }

    pub fn is_active_at_temperature(&self, temperature: f64) -> bool {
        if !self.is_active {
            return false;
        }
        if self.temp_min.is_some_and(|min| temperature < min) {
            return false;
        }
        if self.temp_max.is_some_and(|max| temperature > max) {
            return false;
        }
        true
    }

    /// Active at the scenario's moment and, when a temperature is known, at
    /// that temperature.
    pub fn is_active_under(&self, scenario: &Scenario) -> bool {
        self.is_active_at(&scenario.moment)
            && scenario
                .temperature
                .map_or(true, |t| self.is_active_at_temperature(t))
    }

    pub fn is_hashing_at(&self, moment: &DateTime<Tz>) -> bool {
        self.hashing_enabled && self.is_active_at(moment)
    }

    /// When the window containing `moment` closes. Returns `moment` itself
    /// when the interval is not active then.
    pub fn next_end_time(&self, moment: &DateTime<Tz>) -> DateTime<Tz> {
        if !self.is_active_at(moment) {
            return moment.clone();
        }

        let tz = moment.timezone();
        let anchor = match self.window_anchor(moment.naive_local()) {
            Some(d) => d,
            None => return moment.clone(),
        };

        if self.is_all_day() {
            let (_, date_end) = self.date_range(anchor);
            return localize(&tz, date_end.and_time(end_of_day()), moment);
        }

        let end_date = if self.wraps_midnight() {
            anchor.succ_opt().unwrap_or(anchor)
        } else {
            anchor
        };
        localize(&tz, end_date.and_time(self.daytime_end.as_end()), moment)
    }
}

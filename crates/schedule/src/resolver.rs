//! Picks the single interval that applies to a device right now.

use tracing::debug;

use crate::interval::Interval;
use crate::overrides::Override;
use crate::scenario::Scenario;
use crate::schedule::Schedule;

/// Outcome of resolving a device's current interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// The device's override applies and supersedes its schedule.
    Override(&'a Interval),
    /// An interval from the device's schedule applies.
    Scheduled(&'a Interval),
    /// Nothing applies; the device keeps its current state.
    Unscheduled,
}

impl<'a> Resolution<'a> {
    pub fn interval(&self) -> Option<&'a Interval> {
        match self {
            Resolution::Override(i) | Resolution::Scheduled(i) => Some(i),
            Resolution::Unscheduled => None,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Resolution::Override(_))
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            Resolution::Override(_) => "override",
            Resolution::Scheduled(_) => "schedule",
            Resolution::Unscheduled => "none",
        }
    }
}

/// Override first, then the schedule's intervals in priority order.
pub fn resolve<'a>(
    override_: Option<&'a Override>,
    schedule: Option<&'a Schedule>,
    scenario: &Scenario,
) -> Resolution<'a> {
    if let Some(o) = override_ {
        if o.is_active_under(scenario) {
            return Resolution::Override(&o.interval);
        }
    }
    resolve_scheduled(schedule, scenario)
}

/// Resolve against the schedule alone, ignoring any override.
pub fn resolve_scheduled<'a>(schedule: Option<&'a Schedule>, scenario: &Scenario) -> Resolution<'a> {
    let Some(schedule) = schedule else {
        debug!(moment = %scenario.moment, "no schedule linked");
        return Resolution::Unscheduled;
    };

    match schedule.active_interval(scenario) {
        Some(interval) => Resolution::Scheduled(interval),
        None => {
            debug!(moment = %scenario.moment, schedule = %schedule.id, "no interval applies");
            Resolution::Unscheduled
        }
    }
}

//! Energy budgets of performance limits.
//!
//! Usage is summed from a device's samples over the current local day,
//! ISO week (starting Monday) or calendar month.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use hashctl_schedule::{BudgetPeriod, PerformanceLimit};
use tracing::debug;

use crate::sample::PerformanceSample;

/// First instant of the budget period containing `local`.
pub fn period_start(period: BudgetPeriod, local: &DateTime<Tz>) -> DateTime<Utc> {
    let date = local.date_naive();
    let first: NaiveDate = match period {
        BudgetPeriod::Day => date,
        BudgetPeriod::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        BudgetPeriod::Month => date.with_day(1).unwrap_or(date),
    };
    let tz = local.timezone();
    tz.from_local_datetime(&first.and_time(NaiveTime::MIN))
        .earliest()
        .unwrap_or(*local)
        .with_timezone(&Utc)
}

/// Earliest start among the periods `limit` has a budget for.
pub fn earliest_budget_start(limit: &PerformanceLimit, local: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    BudgetPeriod::ALL
        .iter()
        .filter(|p| limit.budget(**p).is_some())
        .map(|p| period_start(*p, local))
        .min()
}

/// Energy (kWh) recorded at or after `since`.
pub fn energy_since(samples: &[PerformanceSample], since: DateTime<Utc>) -> f64 {
    samples
        .iter()
        .filter(|s| s.timestamp >= since)
        .map(PerformanceSample::energy_kwh)
        .sum()
}

/// Whether any of `limit`'s budgets has been used up.
pub fn budget_exhausted(limit: &PerformanceLimit, samples: &[PerformanceSample], local: &DateTime<Tz>) -> bool {
    BudgetPeriod::ALL.iter().any(|period| {
        let Some(budget) = limit.budget(*period) else {
            return false;
        };
        let used = energy_since(samples, period_start(*period, local));
        if used >= f64::from(budget) {
            debug!(%period, used_kwh = used, budget_kwh = budget, "energy budget exhausted");
            true
        } else {
            false
        }
    })
}

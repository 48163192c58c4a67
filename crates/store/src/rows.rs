//! Row types for the PostgreSQL tables and their conversion into domain values.
//!
//! Window fields (`TimeOfDay`, `MonthDay`, `Weekdays`) are stored in their
//! text form and parsed back on load; watt and kWh quantities are `BIGINT`.

use chrono::{DateTime, Utc};
use hashctl_control::{Device, PerformanceSample, StoreError};
use hashctl_schedule::{parse_timezone, Interval, Override, PerformanceLimit, Schedule};
use sqlx::types::Json;
use uuid::Uuid;

// ── Conversions ──────────────────────────────────────────────────────

pub(crate) fn corrupt(what: &str, id: Uuid, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("invalid {what} {id}: {detail}"))
}

pub(crate) fn to_u32(value: i64, column: &str, id: Uuid) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| corrupt(column, id, format!("{value} out of range")))
}

pub(crate) fn to_opt_u32(value: Option<i64>, column: &str, id: Uuid) -> Result<Option<u32>, StoreError> {
    value.map(|v| to_u32(v, column, id)).transpose()
}

pub(crate) fn from_opt_u32(value: Option<u32>) -> Option<i64> {
    value.map(i64::from)
}

// ── Schedules ────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ScheduleRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub timezone: String,
}

/// An interval joined with its performance limit, if any.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct IntervalRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub daytime_start: String,
    pub daytime_end: String,
    pub date_start: String,
    pub date_end: String,
    pub weekdays: String,
    pub hashing_enabled: bool,
    pub price_per_kwh: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub sort_order: i32,
    pub is_active: bool,
    pub limit_id: Option<Uuid>,
    pub limit_name: Option<String>,
    pub power_limit: Option<i64>,
    pub daily_power_budget: Option<i64>,
    pub weekly_power_budget: Option<i64>,
    pub monthly_power_budget: Option<i64>,
}

impl IntervalRow {
    pub fn into_interval(self) -> Result<Interval, StoreError> {
        let id = self.id;
        let parse_err = |e: hashctl_schedule::ScheduleError| corrupt("interval", id, e);

        let mut interval = Interval::new(
            self.daytime_start.parse().map_err(parse_err)?,
            self.daytime_end.parse().map_err(parse_err)?,
            self.hashing_enabled,
        );
        interval.id = id;
        interval.name = self.name;
        interval.date_start = self.date_start.parse().map_err(parse_err)?;
        interval.date_end = self.date_end.parse().map_err(parse_err)?;
        interval.weekdays = self.weekdays.parse().map_err(parse_err)?;
        interval.price_per_kwh = self.price_per_kwh;
        interval.temp_min = self.temp_min;
        interval.temp_max = self.temp_max;
        interval.order = self.sort_order;
        interval.is_active = self.is_active;

        if let Some(limit_id) = self.limit_id {
            interval.performance_limit = Some(PerformanceLimit {
                id: limit_id,
                name: self.limit_name,
                power_limit: to_opt_u32(self.power_limit, "power_limit", limit_id)?,
                daily_power_budget: to_opt_u32(self.daily_power_budget, "daily_power_budget", limit_id)?,
                weekly_power_budget: to_opt_u32(self.weekly_power_budget, "weekly_power_budget", limit_id)?,
                monthly_power_budget: to_opt_u32(self.monthly_power_budget, "monthly_power_budget", limit_id)?,
            });
        }
        Ok(interval)
    }
}

pub(crate) fn assemble_schedule(row: ScheduleRow, intervals: Vec<IntervalRow>) -> Result<Schedule, StoreError> {
    let timezone = parse_timezone(Some(&row.timezone)).map_err(|e| corrupt("schedule", row.id, e))?;
    let intervals = intervals
        .into_iter()
        .map(IntervalRow::into_interval)
        .collect::<Result<Vec<_>, _>>()?;
    let mut schedule = Schedule::new(row.name, timezone, intervals);
    schedule.id = row.id;
    Ok(schedule)
}

// ── Devices ──────────────────────────────────────────────────────────

/// A device joined with its profile and override.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub password: Option<String>,
    pub is_active: bool,
    pub is_online: bool,
    pub is_hashing: bool,
    pub is_stable: bool,
    pub is_faulted: bool,
    pub power_limit: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub changed_at: Option<DateTime<Utc>>,
    pub profile_id: Option<Uuid>,
    pub profile_name: Option<String>,
    pub schedule_id: Option<Uuid>,
    pub override_interval: Option<Json<Interval>>,
    pub override_created_at: Option<DateTime<Utc>>,
    pub override_expires_at: Option<DateTime<Utc>>,
}

impl DeviceRow {
    /// Build the device; `schedule` is the one linked through its profile.
    pub fn into_device(self, schedule: Option<Schedule>) -> Result<Device, StoreError> {
        let mut device = Device::new(self.name, self.address);
        device.id = self.id;
        device.password = self.password;
        device.is_active = self.is_active;
        device.is_online = self.is_online;
        device.is_hashing = self.is_hashing;
        device.is_stable = self.is_stable;
        device.is_faulted = self.is_faulted;
        device.power_limit = to_opt_u32(self.power_limit, "power_limit", self.id)?;
        device.updated_at = self.updated_at;
        device.changed_at = self.changed_at;

        if let (Some(id), Some(name)) = (self.profile_id, self.profile_name) {
            device.profile = Some(hashctl_control::Profile { id, name, schedule });
        }

        device.manual_override = match (self.override_interval, self.override_created_at, self.override_expires_at) {
            (Some(Json(interval)), Some(created_at), Some(expires_at)) => Some(Override {
                interval,
                created_at,
                expires_at,
            }),
            _ => None,
        };
        Ok(device)
    }
}

// ── Samples ──────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SampleRow {
    pub id: Uuid,
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub interval_secs: i64,
    pub is_online: bool,
    pub is_hashing: bool,
    pub is_stable: bool,
    pub hashrate_ths: f64,
    pub power: i64,
    pub power_limit: Option<i64>,
    pub efficiency: Option<f64>,
    pub temp: Option<f64>,
    pub env_temp: Option<f64>,
    pub price_per_kwh: f64,
    pub interval_id: Option<Uuid>,
}

impl TryFrom<SampleRow> for PerformanceSample {
    type Error = StoreError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        Ok(PerformanceSample {
            id: row.id,
            device_id: row.device_id,
            timestamp: row.timestamp,
            interval_secs: to_u32(row.interval_secs, "interval_secs", row.id)?,
            is_online: row.is_online,
            is_hashing: row.is_hashing,
            is_stable: row.is_stable,
            hashrate_ths: row.hashrate_ths,
            power: to_u32(row.power, "power", row.id)?,
            power_limit: to_opt_u32(row.power_limit, "power_limit", row.id)?,
            efficiency: row.efficiency,
            temp: row.temp,
            env_temp: row.env_temp,
            price_per_kwh: row.price_per_kwh,
            interval_id: row.interval_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_row() -> IntervalRow {
        IntervalRow {
            id: Uuid::new_v4(),
            name: Some("night".into()),
            daytime_start: "22:00".into(),
            daytime_end: "06:00".into(),
            date_start: "10/01".into(),
            date_end: "03/31".into(),
            weekdays: "MoTuWeThFr".into(),
            hashing_enabled: true,
            price_per_kwh: Some(0.08),
            temp_min: None,
            temp_max: Some(30.0),
            sort_order: 3,
            is_active: true,
            limit_id: None,
            limit_name: None,
            power_limit: None,
            daily_power_budget: None,
            weekly_power_budget: None,
            monthly_power_budget: None,
        }
    }

    #[test]
    fn interval_row_parses_window_text() {
        let row = interval_row();
        let id = row.id;
        let interval = row.into_interval().unwrap();
        assert_eq!(interval.id, id);
        assert_eq!(interval.daytime_start.to_string(), "22:00");
        assert_eq!(interval.date_end.to_string(), "03/31");
        assert_eq!(interval.weekdays.to_string(), "MoTuWeThFr");
        assert_eq!(interval.order, 3);
        assert!(interval.performance_limit.is_none());
    }

    #[test]
    fn joined_limit_is_attached() {
        let mut row = interval_row();
        row.limit_id = Some(Uuid::new_v4());
        row.power_limit = Some(2800);
        row.daily_power_budget = Some(60);
        let interval = row.into_interval().unwrap();
        let limit = interval.performance_limit.unwrap();
        assert_eq!(limit.power_limit, Some(2800));
        assert_eq!(limit.daily_power_budget, Some(60));
        assert_eq!(limit.weekly_power_budget, None);
    }

    #[test]
    fn malformed_window_is_a_backend_error() {
        let mut row = interval_row();
        row.daytime_end = "25:00".into();
        let err = row.into_interval().unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg.contains("invalid interval")));
    }

    #[test]
    fn negative_watts_are_rejected() {
        let id = Uuid::new_v4();
        assert_eq!(to_opt_u32(Some(1500), "power", id).unwrap(), Some(1500));
        assert!(to_u32(-1, "power", id).is_err());
    }

    #[test]
    fn unknown_timezone_is_a_backend_error() {
        let row = ScheduleRow {
            id: Uuid::new_v4(),
            name: None,
            timezone: "Mars/Olympus".into(),
        };
        assert!(assemble_schedule(row, vec![]).is_err());
    }

    #[test]
    fn schedule_is_sorted_on_load() {
        let row = ScheduleRow {
            id: Uuid::new_v4(),
            name: Some("winter".into()),
            timezone: "America/Denver".into(),
        };
        let mut late = interval_row();
        late.sort_order = 9;
        late.name = Some("late".into());
        let mut early = interval_row();
        early.sort_order = 1;
        early.name = Some("early".into());

        let schedule = assemble_schedule(row, vec![late, early]).unwrap();
        let names: Vec<_> = schedule.intervals().iter().map(|i| i.label()).collect();
        assert_eq!(names, ["early", "late"]);
        assert_eq!(schedule.timezone.name(), "America/Denver");
    }

    #[test]
    fn device_row_without_override_or_profile() {
        let row = DeviceRow {
            id: Uuid::new_v4(),
            name: "a1".into(),
            address: "10.0.0.1".into(),
            password: None,
            is_active: true,
            is_online: true,
            is_hashing: true,
            is_stable: false,
            is_faulted: false,
            power_limit: Some(3000),
            updated_at: None,
            changed_at: None,
            profile_id: None,
            profile_name: None,
            schedule_id: None,
            override_interval: None,
            override_created_at: None,
            override_expires_at: None,
        };
        let device = row.into_device(None).unwrap();
        assert_eq!(device.power_limit, Some(3000));
        assert!(device.profile.is_none());
        assert!(device.manual_override.is_none());
    }
}

//! [`PgStore`]: the PostgreSQL-backed [`RecordStore`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hashctl_control::{Device, OverrideChange, PerformanceSample, RecordStore, StoreError, UnitOfWork};
use hashctl_core::config::PostgresConfig;
use hashctl_core::{DeviceId, EntityKind, ScheduleId};
use hashctl_schedule::{Interval, Schedule};
use sqlx::postgres::{PgPoolOptions, PgTransaction};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::rows::{assemble_schedule, from_opt_u32, DeviceRow, IntervalRow, SampleRow, ScheduleRow};

const DEVICE_SELECT: &str = "SELECT d.id, d.name, d.address, d.password, d.is_active,
            d.is_online, d.is_hashing, d.is_stable, d.is_faulted, d.power_limit,
            d.updated_at, d.changed_at,
            p.id AS profile_id, p.name AS profile_name, p.schedule_id,
            o.interval_doc AS override_interval,
            o.created_at AS override_created_at,
            o.expires_at AS override_expires_at
     FROM devices d
     LEFT JOIN profiles p ON p.id = d.profile_id
     LEFT JOIN device_overrides o ON o.device_id = d.id";

const SAMPLE_COLUMNS: &str = "id, device_id, \"timestamp\", interval_secs, is_online, is_hashing,
            is_stable, hashrate_ths, power, power_limit, efficiency, temp, env_temp,
            price_per_kwh, interval_id";

fn backend(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the configured pool size and apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
            .map_err(backend)?;
        info!(host = %config.host, database = %config.database, "PostgreSQL connected");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(Self::new(pool))
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        let row = sqlx::query_as::<_, ScheduleRow>("SELECT id, name, timezone FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let intervals = sqlx::query_as::<_, IntervalRow>(
            "SELECT i.id, i.name, i.daytime_start, i.daytime_end, i.date_start, i.date_end,
                    i.weekdays, i.hashing_enabled, i.price_per_kwh, i.temp_min, i.temp_max,
                    i.sort_order, i.is_active,
                    l.id AS limit_id, l.name AS limit_name, l.power_limit,
                    l.daily_power_budget, l.weekly_power_budget, l.monthly_power_budget
             FROM intervals i
             LEFT JOIN performance_limits l ON l.id = i.performance_limit_id
             WHERE i.schedule_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        assemble_schedule(row, intervals).map(Some)
    }

    /// Build devices from rows, loading each linked schedule once.
    async fn assemble(&self, rows: Vec<DeviceRow>) -> Result<Vec<Device>, StoreError> {
        let mut schedules: HashMap<ScheduleId, Option<Schedule>> = HashMap::new();
        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            let schedule = match row.schedule_id {
                Some(id) => {
                    if !schedules.contains_key(&id) {
                        let loaded = self.load_schedule(id).await?;
                        schedules.insert(id, loaded);
                    }
                    schedules.get(&id).cloned().flatten()
                }
                None => None,
            };
            devices.push(row.into_device(schedule)?);
        }
        Ok(devices)
    }

    /// Create or update devices with their profiles and schedules.
    ///
    /// Devices and profiles are matched by name; status fields of existing
    /// devices are left untouched. A schedule's intervals are replaced.
    /// Schedules no profile points at any more, and limits no interval
    /// uses, are deleted in the same transaction.
    pub async fn import_devices(&self, devices: &[Device]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for device in devices {
            let profile_id = match &device.profile {
                Some(profile) => {
                    let schedule_id = match &profile.schedule {
                        Some(schedule) => Some(write_schedule(&mut tx, schedule).await?),
                        None => None,
                    };
                    let id = sqlx::query_scalar::<_, uuid::Uuid>(
                        "INSERT INTO profiles (id, name, schedule_id) VALUES ($1, $2, $3)
                         ON CONFLICT (name) DO UPDATE SET schedule_id = EXCLUDED.schedule_id
                         RETURNING id",
                    )
                    .bind(profile.id)
                    .bind(&profile.name)
                    .bind(schedule_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(backend)?;
                    Some(id)
                }
                None => None,
            };

            sqlx::query(
                "INSERT INTO devices (id, name, address, password, is_active, profile_id)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (name) DO UPDATE SET
                    address = EXCLUDED.address,
                    password = EXCLUDED.password,
                    is_active = EXCLUDED.is_active,
                    profile_id = EXCLUDED.profile_id",
            )
            .bind(device.id)
            .bind(&device.name)
            .bind(&device.address)
            .bind(&device.password)
            .bind(device.is_active)
            .bind(profile_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
            debug!(device = %device.name, "device imported");
        }
        prune_orphans(&mut tx).await?;
        tx.commit().await.map_err(backend)?;
        info!(count = devices.len(), "fleet imported");
        Ok(devices.len())
    }
}

/// Intervals go with their schedule through `ON DELETE CASCADE`.
async fn prune_orphans(tx: &mut PgTransaction<'_>) -> Result<(), StoreError> {
    let schedules = sqlx::query(
        "DELETE FROM schedules s
         WHERE NOT EXISTS (SELECT 1 FROM profiles p WHERE p.schedule_id = s.id)",
    )
    .execute(&mut **tx)
    .await
    .map_err(backend)?
    .rows_affected();

    let limits = sqlx::query(
        "DELETE FROM performance_limits l
         WHERE NOT EXISTS (SELECT 1 FROM intervals i WHERE i.performance_limit_id = l.id)",
    )
    .execute(&mut **tx)
    .await
    .map_err(backend)?
    .rows_affected();

    if schedules > 0 || limits > 0 {
        info!(schedules, limits, "removed records left over from a previous import");
    }
    Ok(())
}

async fn write_schedule(tx: &mut PgTransaction<'_>, schedule: &Schedule) -> Result<ScheduleId, StoreError> {
    sqlx::query(
        "INSERT INTO schedules (id, name, timezone) VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, timezone = EXCLUDED.timezone",
    )
    .bind(schedule.id)
    .bind(&schedule.name)
    .bind(schedule.timezone.name())
    .execute(&mut **tx)
    .await
    .map_err(backend)?;

    sqlx::query("DELETE FROM intervals WHERE schedule_id = $1")
        .bind(schedule.id)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

    for interval in schedule.intervals() {
        write_interval(tx, schedule.id, interval).await?;
    }
    Ok(schedule.id)
}

async fn write_interval(tx: &mut PgTransaction<'_>, schedule_id: ScheduleId, interval: &Interval) -> Result<(), StoreError> {
    let limit_id = match &interval.performance_limit {
        Some(limit) => {
            sqlx::query(
                "INSERT INTO performance_limits
                    (id, name, power_limit, daily_power_budget, weekly_power_budget, monthly_power_budget)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    power_limit = EXCLUDED.power_limit,
                    daily_power_budget = EXCLUDED.daily_power_budget,
                    weekly_power_budget = EXCLUDED.weekly_power_budget,
                    monthly_power_budget = EXCLUDED.monthly_power_budget",
            )
            .bind(limit.id)
            .bind(&limit.name)
            .bind(from_opt_u32(limit.power_limit))
            .bind(from_opt_u32(limit.daily_power_budget))
            .bind(from_opt_u32(limit.weekly_power_budget))
            .bind(from_opt_u32(limit.monthly_power_budget))
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
            Some(limit.id)
        }
        None => None,
    };

    sqlx::query(
        "INSERT INTO intervals
            (id, schedule_id, name, daytime_start, daytime_end, date_start, date_end, weekdays,
             hashing_enabled, price_per_kwh, temp_min, temp_max, sort_order, is_active,
             performance_limit_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(interval.id)
    .bind(schedule_id)
    .bind(&interval.name)
    .bind(interval.daytime_start.to_string())
    .bind(interval.daytime_end.to_string())
    .bind(interval.date_start.to_string())
    .bind(interval.date_end.to_string())
    .bind(interval.weekdays.to_string())
    .bind(interval.hashing_enabled)
    .bind(interval.price_per_kwh)
    .bind(interval.temp_min)
    .bind(interval.temp_max)
    .bind(interval.order)
    .bind(interval.is_active)
    .bind(limit_id)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn insert_sample(tx: &mut PgTransaction<'_>, sample: &PerformanceSample) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "INSERT INTO performance_samples ({SAMPLE_COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
    ))
    .bind(sample.id)
    .bind(sample.device_id)
    .bind(sample.timestamp)
    .bind(i64::from(sample.interval_secs))
    .bind(sample.is_online)
    .bind(sample.is_hashing)
    .bind(sample.is_stable)
    .bind(sample.hashrate_ths)
    .bind(i64::from(sample.power))
    .bind(from_opt_u32(sample.power_limit))
    .bind(sample.efficiency)
    .bind(sample.temp)
    .bind(sample.env_temp)
    .bind(sample.price_per_kwh)
    .bind(sample.interval_id)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;
    Ok(())
}

#[async_trait::async_trait]
impl RecordStore for PgStore {
    async fn device_by_name(&self, name: &str) -> Result<Device, StoreError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!("{DEVICE_SELECT} WHERE d.name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Device,
                key: name.to_string(),
            })?;

        let mut devices = self.assemble(vec![row]).await?;
        devices.pop().ok_or_else(|| StoreError::NotFound {
            kind: EntityKind::Device,
            key: name.to_string(),
        })
    }

    async fn active_devices(&self) -> Result<Vec<Device>, StoreError> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!("{DEVICE_SELECT} WHERE d.is_active ORDER BY d.name"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        self.assemble(rows).await
    }

    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<PerformanceSample>, StoreError> {
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM performance_samples
             WHERE device_id = $1
             ORDER BY \"timestamp\" DESC
             LIMIT 1"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(PerformanceSample::try_from).transpose()
    }

    async fn samples_since(
        &self,
        device_id: DeviceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSample>, StoreError> {
        let rows = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM performance_samples
             WHERE device_id = $1 AND \"timestamp\" >= $2
             ORDER BY \"timestamp\""
        ))
        .bind(device_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(PerformanceSample::try_from).collect()
    }

    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        let parts = work.into_parts();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        if let Some(state) = &parts.state {
            let result = sqlx::query(
                "UPDATE devices SET
                    is_online = $2, is_hashing = $3, is_stable = $4, is_faulted = $5,
                    power_limit = $6, updated_at = $7, changed_at = $8
                 WHERE id = $1",
            )
            .bind(parts.device_id)
            .bind(state.is_online)
            .bind(state.is_hashing)
            .bind(state.is_stable)
            .bind(state.is_faulted)
            .bind(from_opt_u32(state.power_limit))
            .bind(state.updated_at)
            .bind(state.changed_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    kind: EntityKind::Device,
                    key: parts.device_id.to_string(),
                });
            }
        }

        match &parts.override_change {
            Some(OverrideChange::Replace(o)) => {
                sqlx::query(
                    "INSERT INTO device_overrides (device_id, interval_doc, created_at, expires_at)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (device_id) DO UPDATE SET
                        interval_doc = EXCLUDED.interval_doc,
                        created_at = EXCLUDED.created_at,
                        expires_at = EXCLUDED.expires_at",
                )
                .bind(parts.device_id)
                .bind(Json(&o.interval))
                .bind(o.created_at)
                .bind(o.expires_at)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
            Some(OverrideChange::Clear) => {
                sqlx::query("DELETE FROM device_overrides WHERE device_id = $1")
                    .bind(parts.device_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
            }
            None => {}
        }

        for sample in &parts.samples {
            insert_sample(&mut tx, sample).await?;
        }

        tx.commit().await.map_err(backend)?;
        debug!(device_id = %parts.device_id, samples = parts.samples.len(), "unit of work committed");
        Ok(())
    }

    fn store_name(&self) -> &str {
        "postgres"
    }
}

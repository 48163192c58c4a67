//! Fleet import against a live PostgreSQL database.
//!
//! Needs `HASHCTL_TEST_DATABASE_URL`, so the tests are `#[ignore]`d for CI.
//! Run with `cargo nextest run -p hashctl-store -- --ignored`.

use chrono_tz::Tz;
use hashctl_control::{Device, Profile};
use hashctl_core::Uuid;
use hashctl_schedule::{Interval, PerformanceLimit, Schedule};
use hashctl_store::PgStore;
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url = std::env::var("HASHCTL_TEST_DATABASE_URL").expect("HASHCTL_TEST_DATABASE_URL not set");
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// A device whose profile carries a fresh schedule and limit each call.
fn fleet_device(device: &str, profile: &str) -> Device {
    let night = Interval::daily("22:00", "06:00", true)
        .unwrap()
        .named("night")
        .with_limit(PerformanceLimit::with_power_limit(2500));
    Device::new(device, "10.0.0.1").with_profile(Profile {
        id: Uuid::new_v4(),
        name: profile.to_string(),
        schedule: Some(Schedule::new(Some("night".into()), Tz::UTC, vec![night])),
    })
}

async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
}

#[tokio::test]
#[ignore]
async fn reimport_removes_replaced_schedule_and_limit() {
    let pool = pool().await;
    let store = PgStore::new(pool.clone());
    let suffix = Uuid::new_v4().simple().to_string();
    let (device, profile) = (format!("a1-{suffix}"), format!("profile-{suffix}"));

    let first = fleet_device(&device, &profile);
    let old_schedule = first.schedule().unwrap().id;
    let old_limit = first.schedule().unwrap().intervals()[0]
        .performance_limit
        .as_ref()
        .unwrap()
        .id;
    assert_eq!(store.import_devices(&[first]).await.unwrap(), 1);

    let second = fleet_device(&device, &profile);
    let new_schedule = second.schedule().unwrap().id;
    store.import_devices(&[second]).await.unwrap();

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM schedules WHERE id = $1", old_schedule).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM intervals WHERE schedule_id = $1", old_schedule).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM performance_limits WHERE id = $1", old_limit).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM schedules WHERE id = $1", new_schedule).await, 1);

    let linked: Option<Uuid> = sqlx::query_scalar("SELECT schedule_id FROM profiles WHERE name = $1")
        .bind(&profile)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(linked, Some(new_schedule));
}

#[tokio::test]
#[ignore]
async fn devices_sharing_a_profile_keep_their_schedule() {
    let pool = pool().await;
    let store = PgStore::new(pool.clone());
    let suffix = Uuid::new_v4().simple().to_string();
    let profile = format!("shared-{suffix}");

    let a = fleet_device(&format!("a-{suffix}"), &profile);
    let mut b = Device::new(format!("b-{suffix}"), "10.0.0.2");
    b.profile = a.profile.clone();
    let schedule = a.schedule().unwrap().id;
    assert_eq!(store.import_devices(&[a, b]).await.unwrap(), 2);

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM schedules WHERE id = $1", schedule).await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM intervals WHERE schedule_id = $1", schedule).await, 1);
}

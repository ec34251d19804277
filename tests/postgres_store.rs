//! Postgres-backed job store and catalog tests.
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use blendforge::catalog::{CatalogSource, Ingredient, SENSORY_DIMENSIONS};
use blendforge::scheduler::{Job, JobStatus, JobStore, StoreError};
use blendforge::storage::Database;

async fn database() -> Option<Database> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping: DATABASE_URL not set");
            return None;
        }
    };
    let db = Database::connect(&url).await.expect("connect");
    db.run_migrations().await.expect("migrations");
    Some(db)
}

/// A job kind no other test run will touch.
fn unique_kind() -> String {
    format!("test-{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn test_migrations_are_idempotent() {
    let Some(db) = database().await else { return };

    assert_eq!(db.run_migrations().await.expect("rerun"), 0);
    let applied = db.applied_migrations().await.expect("list");
    assert!(applied
        .iter()
        .any(|m| m.name == "0001_create_jobs"));
}

#[tokio::test]
#[ignore]
async fn test_claim_is_compare_and_set() {
    let Some(db) = database().await else { return };
    let kind = unique_kind();

    let job = db
        .create(Job::new(kind.as_str(), json!({"total": 250})))
        .await
        .expect("create");

    let oldest = db.oldest_queued(&kind).await.expect("oldest").expect("queued");
    assert_eq!(oldest.id, job.id);

    assert!(db.claim(job.id, JobStatus::Queued, "w1").await.expect("claim"));
    assert!(!db.claim(job.id, JobStatus::Queued, "w2").await.expect("claim"));

    let leased = db.get(job.id).await.expect("get").expect("present");
    assert_eq!(leased.status, JobStatus::Running);
    assert_eq!(leased.lease_owner.as_deref(), Some("w1"));
    assert!(db.oldest_queued(&kind).await.expect("oldest").is_none());
}

#[tokio::test]
#[ignore]
async fn test_lease_lifecycle() {
    let Some(db) = database().await else { return };
    let kind = unique_kind();

    let job = db
        .create(Job::new(kind.as_str(), json!({"total": 250})))
        .await
        .expect("create");

    let leased = db.lease_next(&kind, "w1").await.expect("lease").expect("job");
    assert_eq!(leased.id, job.id);
    assert_eq!(db.record_attempt(job.id, "w1").await.expect("attempt"), 1);

    let err = db
        .complete(job.id, "w2", json!({"ok": true}))
        .await
        .expect_err("w2 holds no lease");
    assert!(matches!(err, StoreError::LeaseLost { .. }));

    db.release(job.id, "w1", "transient").await.expect("release");
    let released = db.get(job.id).await.expect("get").expect("present");
    assert_eq!(released.status, JobStatus::Queued);
    assert_eq!(released.error.as_deref(), Some("transient"));
    assert!(released.lease_owner.is_none());

    db.lease_next(&kind, "w2").await.expect("lease").expect("job");
    assert_eq!(db.record_attempt(job.id, "w2").await.expect("attempt"), 2);
    db.complete(job.id, "w2", json!({"ok": true}))
        .await
        .expect("complete");

    let done = db.get(job.id).await.expect("get").expect("present");
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.attempts, 2);
    assert_eq!(done.result, Some(json!({"ok": true})));
}

#[tokio::test]
#[ignore]
async fn test_reclaim_stale_leases() {
    let Some(db) = database().await else { return };
    let kind = unique_kind();

    let job = db
        .create(Job::new(kind.as_str(), json!({"total": 250})))
        .await
        .expect("create");
    db.lease_next(&kind, "crashed").await.expect("lease").expect("job");

    // A generous timeout leaves the fresh lease alone.
    assert_eq!(
        db.reclaim_stale(&kind, Duration::from_secs(3600))
            .await
            .expect("reclaim"),
        0
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        db.reclaim_stale(&kind, Duration::from_millis(1))
            .await
            .expect("reclaim"),
        1
    );

    let reclaimed = db.get(job.id).await.expect("get").expect("present");
    assert_eq!(reclaimed.status, JobStatus::Queued);
    assert!(reclaimed.lease_owner.is_none());
    assert!(reclaimed.error.is_some());
}

#[tokio::test]
#[ignore]
async fn test_catalog_loads_active_ingredients() {
    let Some(db) = database().await else { return };
    let suffix = Uuid::new_v4().simple().to_string();
    let active = format!("ACT-{}", &suffix[..8]);
    let retired = format!("RET-{}", &suffix[..8]);

    let ingredients = vec![
        Ingredient::new(active.as_str(), "Colombia Huila", 500, 1.1, [6.0; SENSORY_DIMENSIONS]),
        Ingredient::new(retired.as_str(), "Old Stock", 500, 0.5, [3.0; SENSORY_DIMENSIONS])
            .inactive(),
    ];
    assert_eq!(db.upsert_ingredients(&ingredients).await.expect("upsert"), 2);

    let catalog = db.load().await.expect("load");
    assert!(catalog.contains(&active));
    assert!(!catalog.contains(&retired));
    let loaded = catalog.get(&active).expect("active present");
    assert_eq!(loaded.stock_quantity, 500);
}

#[tokio::test]
#[ignore]
async fn test_reclaim_uses_database_clock() {
    let Some(db) = database().await else { return };
    let kind = unique_kind();

    let job = db
        .create(Job::new(kind.as_str(), json!({"total": 250})))
        .await
        .expect("create");
    db.lease_next(&kind, "w1").await.expect("lease").expect("job");

    // Age the lease by ten seconds on the database's own clock.
    sqlx::query("UPDATE jobs SET leased_at = NOW() - INTERVAL '10 seconds' WHERE id = $1")
        .bind(job.id)
        .execute(db.pool())
        .await
        .expect("age lease");

    assert_eq!(
        db.reclaim_stale(&kind, Duration::from_secs(60))
            .await
            .expect("reclaim"),
        0
    );
    assert_eq!(
        db.reclaim_stale(&kind, Duration::from_secs(5))
            .await
            .expect("reclaim"),
        1
    );
    assert_eq!(
        db.get(job.id).await.expect("get").expect("present").status,
        JobStatus::Queued
    );
}

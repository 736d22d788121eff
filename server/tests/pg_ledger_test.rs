//! Integration tests for the PostgreSQL ledger.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable before running; without it every
//! test returns early.

use backfeed_engine::{ClaimOutcome, Error, Ledger, PublishResult, SyncStatus};
use backfeed_server::db::{connect_ledger, PgLedger, PoolSettings};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const LEASE: u64 = 60_000;

async fn ledger() -> Option<PgLedger> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let settings = PoolSettings {
        url,
        max_connections: 4,
        acquire_timeout: Duration::from_secs(5),
        connect_attempts: 1,
        retry_delay: Duration::from_millis(100),
    };
    let pool = connect_ledger(&settings)
        .await
        .expect("DATABASE_URL is set but the ledger could not be opened");
    Some(PgLedger::new(pool))
}

/// Ids unique per run so tests share one database safely.
fn event_id(name: &str) -> String {
    format!("https://social.example/{name}/{}", Uuid::new_v4())
}

fn result() -> PublishResult {
    PublishResult {
        location: "https://site.example/posts/1".into(),
        body: "created".into(),
    }
}

#[tokio::test]
async fn create_keeps_the_first_payload() {
    let Some(ledger) = ledger().await else { return };
    let id = event_id("create");

    let (first, created) = ledger
        .lookup_or_create(&id, &json!({"v": 1}), 1000)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(first.status, SyncStatus::Started);
    assert_eq!(first.created_at, 1000);

    let (second, created) = ledger
        .lookup_or_create(&id, &json!({"v": 2}), 2000)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.raw_event, json!({"v": 1}));
    assert_eq!(second.created_at, 1000);
}

#[tokio::test]
async fn concurrent_creates_yield_one_record() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);
    let id = event_id("race");

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let ledger = ledger.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            ledger.lookup_or_create(&id, &json!({"n": i}), 1000 + i).await
        }));
    }

    let mut creators = 0;
    for handle in handles {
        let (_, created) = handle.await.unwrap().unwrap();
        creators += usize::from(created);
    }
    assert_eq!(creators, 1);
}

#[tokio::test]
async fn batch_existing_returns_only_known_ids() {
    let Some(ledger) = ledger().await else { return };
    let known = event_id("known");
    let unknown = event_id("unknown");
    ledger.lookup_or_create(&known, &json!({}), 1).await.unwrap();

    let found = ledger
        .existing(&[known.clone(), unknown.clone()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found.contains_key(&known));
    assert!(ledger.existing(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn claims_are_exclusive() {
    let Some(ledger) = ledger().await else { return };
    let id = event_id("claim");
    ledger.lookup_or_create(&id, &json!({}), 1000).await.unwrap();

    match ledger.claim(&id, "p1", 1000, LEASE).await.unwrap() {
        ClaimOutcome::Claimed(record) => {
            assert_eq!(record.claimed_by.as_deref(), Some("p1"));
            assert_eq!(record.lease_expires_at, Some(1000 + LEASE));
        }
        other => panic!("expected claim, got {other:?}"),
    }
    assert_eq!(
        ledger.claim(&id, "p2", 1001, LEASE).await.unwrap(),
        ClaimOutcome::HeldElsewhere { owner: "p1".into() }
    );
    // Re-claiming by the holder extends its own lease
    assert!(matches!(
        ledger.claim(&id, "p1", 1002, LEASE).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));

    // Only the holder can release
    ledger.release(&id, "p2", 1003).await.unwrap();
    let record = ledger.get(&id).await.unwrap().unwrap();
    assert_eq!(record.claimed_by.as_deref(), Some("p1"));

    ledger.release(&id, "p1", 1004).await.unwrap();
    assert!(matches!(
        ledger.claim(&id, "p2", 1005, LEASE).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));

    ledger.mark_complete(&id, "p2", &result(), 1006).await.unwrap();
    assert_eq!(
        ledger.claim(&id, "p1", 1007, LEASE).await.unwrap(),
        ClaimOutcome::AlreadyComplete
    );
}

#[tokio::test]
async fn expired_lease_can_be_taken_over() {
    let Some(ledger) = ledger().await else { return };
    let id = event_id("lease");
    ledger.lookup_or_create(&id, &json!({}), 1000).await.unwrap();

    assert!(matches!(
        ledger.claim(&id, "stalled", 1000, LEASE).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));
    assert!(matches!(
        ledger.claim(&id, "p2", 1000 + LEASE - 1, LEASE).await.unwrap(),
        ClaimOutcome::HeldElsewhere { .. }
    ));

    let taken = 1000 + LEASE;
    match ledger.claim(&id, "p2", taken, LEASE).await.unwrap() {
        ClaimOutcome::Claimed(record) => {
            assert_eq!(record.claimed_by.as_deref(), Some("p2"));
            assert_eq!(record.lease_expires_at, Some(taken + LEASE));
        }
        other => panic!("expected takeover, got {other:?}"),
    }

    // The stalled pass can no longer record its publish
    let err = ledger
        .mark_complete(&id, "stalled", &result(), taken + 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "storage");
    assert!(!ledger.get(&id).await.unwrap().unwrap().is_complete());
}

#[tokio::test]
async fn mark_complete_twice_is_rejected() {
    let Some(ledger) = ledger().await else { return };
    let id = event_id("complete");
    ledger.lookup_or_create(&id, &json!({}), 1000).await.unwrap();
    ledger.claim(&id, "p1", 1000, LEASE).await.unwrap();

    let record = ledger.mark_complete(&id, "p1", &result(), 2000).await.unwrap();
    assert!(record.is_complete());
    assert_eq!(record.updated_at, 2000);
    assert_eq!(record.publish_result, Some(result()));
    assert!(record.claimed_by.is_none());

    let err = ledger
        .mark_complete(&id, "p1", &result(), 3000)
        .await
        .unwrap_err();
    assert_eq!(err, Error::AlreadyComplete(id.clone()));

    let stored = ledger.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.updated_at, 2000);
}

#[tokio::test]
async fn mark_complete_unknown_record() {
    let Some(ledger) = ledger().await else { return };
    let id = event_id("missing");

    let err = ledger
        .mark_complete(&id, "p1", &result(), 1)
        .await
        .unwrap_err();
    assert_eq!(err, Error::RecordNotFound(id));
}

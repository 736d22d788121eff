//! HTTP trigger tests with in-memory collaborators.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use backfeed_engine::{
    Error, Event, EventType, Ledger, MemoryLedger, PublishError, PublishRequest, PublishResult,
    Publisher, Source, SyncDriver,
};
use backfeed_server::config::Config;
use backfeed_server::{app, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

struct StaticSource {
    events: Vec<Event>,
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_activities(&self, _: bool, _: bool) -> Result<Vec<Event>, Error> {
        Ok(self.events.clone())
    }

    async fn resolve_referenced_object(&self, id: &str) -> Result<Event, Error> {
        Ok(Event::new(id, EventType::Other).with_url(format!("https://social.example/{id}")))
    }

    fn embed_markup(&self, _: &Event) -> String {
        String::new()
    }
}

#[derive(Default)]
struct CountingPublisher {
    calls: AtomicUsize,
    fail: bool,
    /// Holds every publish until notified
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&self, _: &PublishRequest) -> Result<PublishResult, PublishError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(PublishError::Transient("down".into()));
        }
        Ok(PublishResult {
            location: format!("https://site.example/posts/{n}"),
            body: String::new(),
        })
    }
}

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://localhost/backfeed"),
        ("MICROPUB_ENDPOINT", "https://site.example/micropub"),
        ("MICROPUB_TOKEN", "secret"),
        ("FACEBOOK_ACCESS_TOKEN", "fb-token"),
        ("FACEBOOK_VERIFY_TOKEN", "hook-token"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

struct Harness {
    state: AppState,
    ledger: Arc<MemoryLedger>,
    publisher: Arc<CountingPublisher>,
}

fn harness(config: Config, fail: bool) -> Harness {
    harness_with(
        config,
        CountingPublisher {
            fail,
            ..Default::default()
        },
    )
}

fn harness_with(config: Config, publisher: CountingPublisher) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let publisher = Arc::new(publisher);
    let source = Arc::new(StaticSource {
        events: vec![Event::new("evt-1", EventType::Like).with_reference("post-1")],
    });
    let driver = SyncDriver::new(
        source,
        ledger.clone(),
        publisher.clone(),
        config.categories.clone(),
        config.sync_options(),
    );
    Harness {
        state: AppState {
            driver: Arc::new(driver),
            config: Arc::new(config),
        },
        ledger,
        publisher,
    }
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn notify(payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/facebook/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn feed_change() -> Value {
    json!({"object": "user", "entry": [{"changed_fields": ["feed"]}]})
}

/// Wait for background passes to reach the publisher.
async fn wait_for_calls(publisher: &CountingPublisher, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while publisher.calls.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background pass never published");
}

#[tokio::test]
async fn run_publishes_once_across_triggers() {
    let h = harness(config(&[]), false);

    let (status, body) = send(&h.state, get("/sync/run")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"status": "ok"}));

    let post = Request::builder()
        .method("POST")
        .uri("/sync/run")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.state, post).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
    let record = h.ledger.get("evt-1").await.unwrap().unwrap();
    assert!(record.is_complete());
}

#[tokio::test]
async fn failed_event_returns_server_error() {
    let h = harness(config(&[]), true);

    let (status, body) = send(&h.state, get("/sync/run")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"error": "sync pass failed"})
    );
    assert!(!h.ledger.get("evt-1").await.unwrap().unwrap().is_complete());
}

#[tokio::test]
async fn trigger_token_is_enforced() {
    let h = harness(config(&[("TRIGGER_TOKEN", "let-me-in")]), false);

    let (status, _) = send(&h.state, get("/sync/run")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/sync/run")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.state, wrong).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);

    let right = Request::builder()
        .uri("/sync/run")
        .header(header::AUTHORIZATION, "Bearer let-me-in")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.state, right).await.0, StatusCode::OK);
}

#[tokio::test]
async fn webhook_verification_and_notification() {
    let h = harness(config(&[]), false);

    let (status, body) = send(
        &h.state,
        get("/facebook/webhook?hub.mode=subscribe&hub.verify_token=hook-token&hub.challenge=42"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"42\r\n");

    let (status, _) = send(
        &h.state,
        get("/facebook/webhook?hub.mode=subscribe&hub.verify_token=bad&hub.challenge=42"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &h.state,
        notify(json!({"object": "page", "entry": [{"changed_fields": ["feed"]}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"status": "ignored"})
    );

    let (status, body) = send(&h.state, notify(feed_change())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"status": "accepted"})
    );
    wait_for_calls(&h.publisher, 1).await;
}

#[tokio::test]
async fn webhook_answers_before_the_pass_finishes() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(
        config(&[]),
        CountingPublisher {
            gate: Some(gate.clone()),
            ..Default::default()
        },
    );

    let (status, _) = send(&h.state, notify(feed_change())).await;
    assert_eq!(status, StatusCode::OK);

    // The publish is still parked, so nothing is recorded yet
    wait_for_calls(&h.publisher, 1).await;
    assert!(!h.ledger.get("evt-1").await.unwrap().unwrap().is_complete());

    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = h.ledger.get("evt-1").await.unwrap().unwrap();
            if record.is_complete() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background pass never completed");

    // A repeated delivery runs another pass that publishes nothing new
    let (status, _) = send(&h.state, notify(feed_change())).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_reports_wiring() {
    let h = harness(
        config(&[
            ("SYNDICATE_CATEGORIES", "like=likes"),
            ("TRIGGER_TOKEN", "let-me-in"),
            ("POLL_INTERVAL_SECS", "300"),
        ]),
        false,
    );

    // Open even when the trigger needs a token
    let (status, body) = send(&h.state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["source"], "static");
    assert_eq!(body["categories"], "like=likes");
    assert_eq!(
        body["triggers"],
        json!({"runRequiresToken": true, "webhookVerification": true, "pollIntervalSecs": 300})
    );
    assert_eq!(send(&h.state, get("/")).await.0, StatusCode::NOT_FOUND);
}

//! Liveness and wiring report.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Platform events are read from
    pub source: String,
    /// Allow-list in its `SYNDICATE_CATEGORIES` form
    pub categories: String,
    pub triggers: Triggers,
}

/// How passes get started on this instance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Triggers {
    pub run_requires_token: bool,
    pub webhook_verification: bool,
    /// Seconds between internal passes; absent when driven externally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        source: state.driver.source_name().to_string(),
        categories: state.driver.categories().to_string(),
        triggers: Triggers {
            run_requires_token: config.trigger_token.is_some(),
            webhook_verification: config.facebook_verify_token.is_some(),
            poll_interval_secs: config.poll_interval.map(|every| every.as_secs()),
        },
    })
}

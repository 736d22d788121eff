//! Backfeed Server - HTTP trigger, storage and platform adapters for the
//! backfeed engine.
//!
//! The server owns everything with IO: the PostgreSQL ledger, the Micropub
//! publisher, the platform sources and the HTTP surface that starts passes.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod publisher;
pub mod routes;
pub mod scheduler;
pub mod sources;

use crate::config::Config;
use axum::Router;
use backfeed_engine::SyncDriver;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<SyncDriver>,
    pub config: Arc<Config>,
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Facebook webhook routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::Result;
use crate::handlers::{handle_verify, Notification, VerifyQuery};
use crate::{scheduler, AppState};

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// Create webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/facebook/webhook", get(verify_handler).post(notify_handler))
}

/// GET /facebook/webhook - Subscription verification.
async fn verify_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String> {
    handle_verify(query, state.config.facebook_verify_token.as_deref())
}

/// POST /facebook/webhook - Change notification.
///
/// Answers at once and leaves the pass to a background task.
async fn notify_handler(
    State(state): State<AppState>,
    Json(notification): Json<Notification>,
) -> Json<WebhookResponse> {
    if !notification.is_feed_change() {
        tracing::debug!(object = %notification.object, "ignoring webhook notification");
        return Json(WebhookResponse { status: "ignored" });
    }

    tracing::info!("feed changed, starting sync pass");
    scheduler::spawn_once(state.driver.clone(), "webhook");
    Json(WebhookResponse { status: "accepted" })
}

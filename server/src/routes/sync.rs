//! Sync trigger routes.

use axum::{extract::State, routing::get, Json, Router};

use crate::auth::TriggerAuth;
use crate::error::Result;
use crate::handlers::{handle_run, RunResponse};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/sync/run", get(run_handler).post(run_handler))
}

/// GET|POST /sync/run - Run one sync pass.
async fn run_handler(
    State(state): State<AppState>,
    _auth: TriggerAuth,
) -> Result<Json<RunResponse>> {
    let response = handle_run(&state.driver).await?;
    Ok(Json(response))
}

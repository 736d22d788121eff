//! Run handler - executes one sync pass on demand.

use crate::error::{AppError, Result};
use backfeed_engine::{PassReport, SyncDriver};
use serde::Serialize;
use uuid::Uuid;

/// Response for a successful pass.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
}

/// Run one pass under a fresh pass id.
pub async fn run_pass(driver: &SyncDriver) -> std::result::Result<PassReport, backfeed_engine::Error> {
    let pass_id = Uuid::new_v4().to_string();
    driver.run_pass(&pass_id).await
}

/// Run one pass and map its report to a trigger response.
pub async fn handle_run(driver: &SyncDriver) -> Result<RunResponse> {
    let report = run_pass(driver).await?;
    if report.is_success() {
        Ok(RunResponse { status: "ok" })
    } else {
        Err(AppError::PassFailed {
            pass_id: report.pass_id,
            failed: report.failures.len(),
        })
    }
}

//! Background passes: the internal polling loop and one-off passes started
//! by webhook notifications.

use crate::handlers::run_pass;
use backfeed_engine::SyncDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run a pass every `every`, starting immediately.
///
/// A slow pass delays the next tick rather than overlapping it.
pub fn spawn(driver: Arc<SyncDriver>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            run_logged(&driver, "schedule").await;
        }
    })
}

/// Run a single pass in the background.
///
/// Overlap with other passes is safe: the ledger claim decides who publishes.
pub fn spawn_once(driver: Arc<SyncDriver>, trigger: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move { run_logged(&driver, trigger).await })
}

/// Run one pass and log its outcome; nobody is waiting on the result.
pub async fn run_logged(driver: &SyncDriver, trigger: &'static str) {
    match run_pass(driver).await {
        Ok(report) if report.is_success() => tracing::debug!(
            trigger,
            pass_id = %report.pass_id,
            published = report.published,
            "background pass ok"
        ),
        Ok(report) => tracing::warn!(
            trigger,
            pass_id = %report.pass_id,
            failed = report.failures.len(),
            "background pass had failures"
        ),
        Err(e) => tracing::error!(trigger, kind = e.kind(), error = %e, "background pass aborted"),
    }
}

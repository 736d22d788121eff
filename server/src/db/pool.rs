//! Ledger database connection and schema setup.

use crate::config::Config;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How the ledger pool is opened.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    /// Bound on waiting for a connection, including each startup attempt
    pub acquire_timeout: Duration,
    /// Connection attempts at startup, at least one
    pub connect_attempts: u32,
    /// Pause after the first failed attempt; doubles after each further one
    pub retry_delay: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.database_max_connections,
            acquire_timeout: Duration::from_secs(10),
            connect_attempts: config.database_connect_attempts,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("ledger database unreachable after {attempts} attempts: {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("ledger migration failed: {0}")]
    Migrate(#[from] MigrateError),
}

/// Open the ledger pool and bring `sync_records` up to date.
///
/// The database often starts alongside the server, so refused connections
/// are retried with backoff before startup fails.
pub async fn connect_ledger(settings: &PoolSettings) -> Result<PgPool, PoolError> {
    let attempts = settings.connect_attempts.max(1);
    let options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout);

    let mut failures = 0;
    let pool = loop {
        match options.clone().connect(&settings.url).await {
            Ok(pool) => break pool,
            Err(source) => {
                failures += 1;
                if failures >= attempts {
                    return Err(PoolError::Connect { attempts, source });
                }
                let delay = retry_delay(settings.retry_delay, failures);
                tracing::warn!(
                    attempt = failures,
                    of = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %source,
                    "ledger database not ready"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    let migrator = sqlx::migrate!("./migrations");
    migrator.run(&pool).await?;
    tracing::info!(
        migrations = migrator.iter().count(),
        max_connections = settings.max_connections,
        "ledger schema ready"
    );
    Ok(pool)
}

/// Delay after `failures` consecutive failed attempts.
fn retry_delay(first: Duration, failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    first.saturating_mul(1 << doublings).min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        let first = Duration::from_secs(1);
        let delays: Vec<_> = (1..=7).map(|n| retry_delay(first, n).as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(retry_delay(first, u32::MAX), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn unreachable_database_reports_attempts() {
        let settings = PoolSettings {
            url: "postgres://backfeed@127.0.0.1:1/backfeed".into(),
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
            connect_attempts: 2,
            retry_delay: Duration::from_millis(1),
        };

        let err = connect_ledger(&settings).await.unwrap_err();
        assert!(matches!(err, PoolError::Connect { attempts: 2, .. }));
    }
}

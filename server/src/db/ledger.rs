//! PostgreSQL implementation of the dedup ledger.

use async_trait::async_trait;
use backfeed_engine::{
    ClaimOutcome, Error, EventId, Ledger, PublishResult, SyncRecord, SyncStatus, Timestamp,
};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

const COLUMNS: &str = "event_id, raw_event, publish_result, status, created_at, updated_at, \
                       claimed_by, lease_expires_at";

/// A stored sync record row from the database.
#[derive(Debug)]
pub struct StoredSyncRecord {
    pub event_id: String,
    pub raw_event: serde_json::Value,
    pub publish_result: Option<serde_json::Value>,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredSyncRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredSyncRecord {
            event_id: row.try_get("event_id")?,
            raw_event: row.try_get("raw_event")?,
            publish_result: row.try_get("publish_result")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            claimed_by: row.try_get("claimed_by")?,
            lease_expires_at: row.try_get("lease_expires_at")?,
        })
    }
}

impl StoredSyncRecord {
    /// Convert database row to an engine record.
    pub fn to_record(&self) -> backfeed_engine::error::Result<SyncRecord> {
        let publish_result = self
            .publish_result
            .clone()
            .map(serde_json::from_value::<PublishResult>)
            .transpose()
            .map_err(|e| {
                Error::Storage(format!("bad publish_result for {}: {e}", self.event_id))
            })?;

        Ok(SyncRecord {
            event_id: self.event_id.clone(),
            raw_event: self.raw_event.clone(),
            publish_result,
            status: SyncStatus::parse(&self.status)?,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
            claimed_by: self.claimed_by.clone(),
            lease_expires_at: self.lease_expires_at.map(|t| t as u64),
        })
    }
}

fn storage(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

/// Ledger stored in the `sync_records` table.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, event_id: &str) -> backfeed_engine::error::Result<Option<SyncRecord>> {
        sqlx::query_as::<_, StoredSyncRecord>(&format!(
            "SELECT {COLUMNS} FROM sync_records WHERE event_id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .map(|row| row.to_record())
        .transpose()
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn existing(
        &self,
        ids: &[EventId],
    ) -> backfeed_engine::error::Result<HashMap<EventId, SyncRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, StoredSyncRecord>(&format!(
            "SELECT {COLUMNS} FROM sync_records WHERE event_id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| Ok((row.event_id.clone(), row.to_record()?)))
            .collect()
    }

    async fn lookup_or_create(
        &self,
        event_id: &str,
        raw_event: &serde_json::Value,
        now: Timestamp,
    ) -> backfeed_engine::error::Result<(SyncRecord, bool)> {
        let inserted = sqlx::query_as::<_, StoredSyncRecord>(&format!(
            r#"
            INSERT INTO sync_records (event_id, raw_event, status, created_at, updated_at)
            VALUES ($1, $2, 'started', $3, $3)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(raw_event)
        .bind(now as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        if let Some(row) = inserted {
            return Ok((row.to_record()?, true));
        }

        // Lost the race to a concurrent insert; read the winner's row
        let existing = self
            .fetch(event_id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(event_id.to_string()))?;
        Ok((existing, false))
    }

    async fn get(&self, event_id: &str) -> backfeed_engine::error::Result<Option<SyncRecord>> {
        self.fetch(event_id).await
    }

    async fn claim(
        &self,
        event_id: &str,
        owner: &str,
        now: Timestamp,
        lease: Timestamp,
    ) -> backfeed_engine::error::Result<ClaimOutcome> {
        let claimed = sqlx::query_as::<_, StoredSyncRecord>(&format!(
            r#"
            UPDATE sync_records
            SET claimed_by = $2, lease_expires_at = $4, updated_at = $3
            WHERE event_id = $1
              AND status = 'started'
              AND (claimed_by IS NULL OR claimed_by = $2
                   OR lease_expires_at IS NULL OR lease_expires_at <= $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(owner)
        .bind(now as i64)
        .bind(now.saturating_add(lease) as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        if let Some(row) = claimed {
            return Ok(ClaimOutcome::Claimed(row.to_record()?));
        }

        let record = self
            .fetch(event_id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(event_id.to_string()))?;
        if record.is_complete() {
            return Ok(ClaimOutcome::AlreadyComplete);
        }
        Ok(ClaimOutcome::HeldElsewhere {
            owner: record.claimed_by.unwrap_or_default(),
        })
    }

    async fn release(
        &self,
        event_id: &str,
        owner: &str,
        now: Timestamp,
    ) -> backfeed_engine::error::Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_records
            SET claimed_by = NULL, lease_expires_at = NULL, updated_at = $3
            WHERE event_id = $1 AND claimed_by = $2
            "#,
        )
        .bind(event_id)
        .bind(owner)
        .bind(now as i64)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn mark_complete(
        &self,
        event_id: &str,
        owner: &str,
        result: &PublishResult,
        now: Timestamp,
    ) -> backfeed_engine::error::Result<SyncRecord> {
        let result_json = serde_json::to_value(result)
            .map_err(|e| Error::Storage(format!("encoding publish result: {e}")))?;

        let updated = sqlx::query_as::<_, StoredSyncRecord>(&format!(
            r#"
            UPDATE sync_records
            SET status = 'complete', publish_result = $3,
                claimed_by = NULL, lease_expires_at = NULL, updated_at = $4
            WHERE event_id = $1
              AND status = 'started'
              AND (claimed_by IS NULL OR claimed_by = $2
                   OR lease_expires_at IS NULL OR lease_expires_at <= $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(owner)
        .bind(&result_json)
        .bind(now as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        if let Some(row) = updated {
            return row.to_record();
        }

        match self.fetch(event_id).await? {
            None => Err(Error::RecordNotFound(event_id.to_string())),
            Some(record) if record.is_complete() => {
                Err(Error::AlreadyComplete(event_id.to_string()))
            }
            Some(record) => Err(Error::Storage(format!(
                "record {event_id} is claimed by {}",
                record.claimed_by.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str, publish_result: Option<serde_json::Value>) -> StoredSyncRecord {
        StoredSyncRecord {
            event_id: "https://www.facebook.com/1/posts/2".into(),
            raw_event: json!({"id": "1_2"}),
            publish_result,
            status: status.into(),
            created_at: 1_000,
            updated_at: 2_000,
            claimed_by: Some("pass-a".into()),
            lease_expires_at: Some(5_000),
        }
    }

    #[test]
    fn converts_complete_row() {
        let record = row(
            "complete",
            Some(json!({"location": "https://site.example/1", "body": ""})),
        )
        .to_record()
        .unwrap();

        assert!(record.is_complete());
        assert_eq!(
            record.publish_result.unwrap().location,
            "https://site.example/1"
        );
        assert_eq!(record.lease_expires_at, Some(5_000));
        assert_eq!(record.created_at, 1_000);
    }

    #[test]
    fn rejects_unknown_status() {
        let err = row("published", None).to_record().unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn rejects_malformed_result() {
        let err = row("complete", Some(json!({"url": 1})))
            .to_record()
            .unwrap_err();
        assert_eq!(err.kind(), "storage");
    }
}

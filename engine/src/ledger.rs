//! Dedup ledger.
//!
//! The ledger is the only shared mutable state in the system. Every
//! implementation must provide:
//!
//! - atomic create-if-absent keyed by event id,
//! - a guarded publish claim, so overlapping passes never both publish,
//! - a guarded `started -> complete` transition.
//!
//! [`MemoryLedger`] is the reference implementation; the server crate
//! provides the PostgreSQL one.

use crate::error::{Error, Result};
use crate::publish::PublishResult;
use crate::record::{ClaimOutcome, SyncRecord};
use crate::{EventId, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Durable per-event processing state.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Records that already exist for any of `ids`, in one round trip.
    async fn existing(&self, ids: &[EventId]) -> Result<HashMap<EventId, SyncRecord>>;

    /// Return the record for `event_id`, creating a `started` one if absent.
    ///
    /// The boolean is true only for the caller that created the record.
    async fn lookup_or_create(
        &self,
        event_id: &str,
        raw_event: &serde_json::Value,
        now: Timestamp,
    ) -> Result<(SyncRecord, bool)>;

    async fn get(&self, event_id: &str) -> Result<Option<SyncRecord>>;

    /// Take the publish claim for `owner` until `now + lease`.
    async fn claim(
        &self,
        event_id: &str,
        owner: &str,
        now: Timestamp,
        lease: Timestamp,
    ) -> Result<ClaimOutcome>;

    /// Give up `owner`'s claim after a failed publish.
    async fn release(&self, event_id: &str, owner: &str, now: Timestamp) -> Result<()>;

    /// Mark the record complete with the publish result.
    async fn mark_complete(
        &self,
        event_id: &str,
        owner: &str,
        result: &PublishResult,
        now: Timestamp,
    ) -> Result<SyncRecord>;
}

/// In-process ledger backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<EventId, SyncRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record, for inspection.
    pub fn snapshot(&self) -> Result<Vec<SyncRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<EventId, SyncRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Storage("memory ledger lock poisoned".into()))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn existing(&self, ids: &[EventId]) -> Result<HashMap<EventId, SyncRecord>> {
        let records = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    async fn lookup_or_create(
        &self,
        event_id: &str,
        raw_event: &serde_json::Value,
        now: Timestamp,
    ) -> Result<(SyncRecord, bool)> {
        let mut records = self.lock()?;
        if let Some(existing) = records.get(event_id) {
            return Ok((existing.clone(), false));
        }

        let record = SyncRecord::started(event_id, raw_event.clone(), now);
        records.insert(event_id.to_string(), record.clone());
        Ok((record, true))
    }

    async fn get(&self, event_id: &str) -> Result<Option<SyncRecord>> {
        Ok(self.lock()?.get(event_id).cloned())
    }

    async fn claim(
        &self,
        event_id: &str,
        owner: &str,
        now: Timestamp,
        lease: Timestamp,
    ) -> Result<ClaimOutcome> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(event_id)
            .ok_or_else(|| Error::RecordNotFound(event_id.to_string()))?;
        Ok(record.claim(owner, now, lease))
    }

    async fn release(&self, event_id: &str, owner: &str, now: Timestamp) -> Result<()> {
        let mut records = self.lock()?;
        if let Some(record) = records.get_mut(event_id) {
            record.release(owner, now);
        }
        Ok(())
    }

    async fn mark_complete(
        &self,
        event_id: &str,
        owner: &str,
        result: &PublishResult,
        now: Timestamp,
    ) -> Result<SyncRecord> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(event_id)
            .ok_or_else(|| Error::RecordNotFound(event_id.to_string()))?;
        record.complete(owner, result.clone(), now)?;
        Ok(record.clone())
    }
}

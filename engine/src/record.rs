//! Sync records: the durable per-event processing state.

use crate::error::{Error, Result};
use crate::publish::PublishResult;
use crate::{EventId, Timestamp};
use serde::{Deserialize, Serialize};

/// Processing status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// First seen; publishing may be (re)attempted
    Started,
    /// Published; never touched again
    Complete,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Started => "started",
            SyncStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(SyncStatus::Started),
            "complete" => Ok(SyncStatus::Complete),
            other => Err(Error::Storage(format!("unknown sync status: {other}"))),
        }
    }
}

/// Result of trying to take the publish claim on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The caller now owns the record until the lease expires
    Claimed(SyncRecord),
    /// Another pass already published this event
    AlreadyComplete,
    /// Another pass holds a live claim
    HeldElsewhere { owner: String },
}

/// Per-event record kept by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Identical to the event id
    pub event_id: EventId,
    /// Event payload at first sight, never rewritten
    pub raw_event: serde_json::Value,
    /// Present once the event has been published
    pub publish_result: Option<PublishResult>,
    pub status: SyncStatus,
    /// Milliseconds since epoch
    pub created_at: Timestamp,
    /// Milliseconds since epoch, refreshed on every write
    pub updated_at: Timestamp,
    /// Pass currently allowed to publish this event
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<Timestamp>,
}

impl SyncRecord {
    /// A freshly seen event.
    pub fn started(event_id: impl Into<EventId>, raw_event: serde_json::Value, now: Timestamp) -> Self {
        Self {
            event_id: event_id.into(),
            raw_event,
            publish_result: None,
            status: SyncStatus::Started,
            created_at: now,
            updated_at: now,
            claimed_by: None,
            lease_expires_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SyncStatus::Complete
    }

    /// Whether a claim by someone other than `owner` is still live at `now`.
    fn held_by_other(&self, owner: &str, now: Timestamp) -> Option<&str> {
        match (&self.claimed_by, self.lease_expires_at) {
            (Some(holder), Some(expires)) if holder != owner && expires > now => Some(holder),
            _ => None,
        }
    }

    /// Take the publish claim for `owner` until `now + lease`.
    pub fn claim(&mut self, owner: &str, now: Timestamp, lease: Timestamp) -> ClaimOutcome {
        if self.is_complete() {
            return ClaimOutcome::AlreadyComplete;
        }
        if let Some(holder) = self.held_by_other(owner, now) {
            return ClaimOutcome::HeldElsewhere {
                owner: holder.to_string(),
            };
        }

        self.claimed_by = Some(owner.to_string());
        self.lease_expires_at = Some(now.saturating_add(lease));
        self.updated_at = now;
        ClaimOutcome::Claimed(self.clone())
    }

    /// Drop `owner`'s claim. A claim held by anyone else is left alone.
    pub fn release(&mut self, owner: &str, now: Timestamp) {
        if self.claimed_by.as_deref() == Some(owner) {
            self.claimed_by = None;
            self.lease_expires_at = None;
            self.updated_at = now;
        }
    }

    /// Transition `started -> complete`.
    ///
    /// Fails with [`Error::AlreadyComplete`] on a complete record, and with
    /// [`Error::Storage`] when a different pass holds a live claim.
    pub fn complete(&mut self, owner: &str, result: PublishResult, now: Timestamp) -> Result<()> {
        if self.is_complete() {
            return Err(Error::AlreadyComplete(self.event_id.clone()));
        }
        if let Some(holder) = self.held_by_other(owner, now) {
            return Err(Error::Storage(format!(
                "record {} is claimed by {holder}",
                self.event_id
            )));
        }

        self.status = SyncStatus::Complete;
        self.publish_result = Some(result);
        self.claimed_by = None;
        self.lease_expires_at = None;
        self.updated_at = now;
        Ok(())
    }
}

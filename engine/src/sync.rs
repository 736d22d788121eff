//! Sync driver: one polling pass from fetch to recorded publish.
//!
//! # Algorithm
//!
//! 1. Fetch recent events from the source
//! 2. Batch-load existing ledger records for every fetched id
//! 3. For each event, in fetch order:
//!    - skip if ineligible, already complete, or a repeat within this pass
//!    - create the record (`started`) or note the retry
//!    - enrich the event, resolve the base object and render the post
//!    - claim the record, publish, mark complete
//! 4. Report failure if any single event failed
//!
//! Per-event failures never stop the pass. A failed fetch or batch lookup
//! aborts it, since dedup decisions would be unsafe without the ledger view.

use crate::classify::{classify, Category, CategoryMap};
use crate::error::Result;
use crate::event::Event;
use crate::ledger::Ledger;
use crate::publish::Publisher;
use crate::record::{ClaimOutcome, SyncRecord};
use crate::render::{compose, resolve_base};
use crate::source::Source;
use crate::{now_millis, EventId, Timestamp};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Knobs for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Only fetch the account owner's own activity
    pub self_only: bool,
    /// Include reactions (likes, shares) in the fetch
    pub include_reactions: bool,
    /// How long a publish claim stays valid, in milliseconds
    pub claim_lease: Timestamp,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            self_only: true,
            include_reactions: true,
            claim_lease: 11 * 60 * 1000,
        }
    }
}

/// One event that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFailure {
    pub event_id: EventId,
    pub kind: String,
    pub message: String,
}

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass_id: String,
    pub fetched: usize,
    pub ineligible: usize,
    pub duplicates: usize,
    pub already_complete: usize,
    /// Skipped because another pass holds the publish claim
    pub contended: usize,
    pub published: usize,
    pub failures: Vec<EventFailure>,
}

impl PassReport {
    fn new(pass_id: &str) -> Self {
        Self {
            pass_id: pass_id.to_string(),
            ..Default::default()
        }
    }

    /// True when no event failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Outcome {
    Published,
    AlreadyComplete,
    Contended,
}

/// Orchestrates passes over one source, one ledger and one publisher.
pub struct SyncDriver {
    source: Arc<dyn Source>,
    ledger: Arc<dyn Ledger>,
    publisher: Arc<dyn Publisher>,
    categories: CategoryMap,
    options: SyncOptions,
}

impl SyncDriver {
    pub fn new(
        source: Arc<dyn Source>,
        ledger: Arc<dyn Ledger>,
        publisher: Arc<dyn Publisher>,
        categories: CategoryMap,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            ledger,
            publisher,
            categories,
            options,
        }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    /// Name of the platform events are read from.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one pass. `pass_id` must be unique per pass; it owns publish claims.
    pub async fn run_pass(&self, pass_id: &str) -> Result<PassReport> {
        let mut report = PassReport::new(pass_id);

        let events = self
            .source
            .fetch_activities(self.options.self_only, self.options.include_reactions)
            .await
            .inspect_err(|e| error!(pass_id, source = self.source.name(), error = %e, "fetch failed"))?;
        report.fetched = events.len();
        info!(pass_id, source = self.source.name(), fetched = events.len(), "starting sync pass");

        let mut ids: Vec<EventId> = events.iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids.dedup();
        let known: HashMap<EventId, SyncRecord> = self
            .ledger
            .existing(&ids)
            .await
            .inspect_err(|e| error!(pass_id, error = %e, "batch ledger lookup failed"))?;

        let mut seen = HashSet::new();
        for event in &events {
            if !seen.insert(event.id.as_str()) {
                debug!(pass_id, event_id = %event.id, "repeated in this fetch, skipping");
                report.duplicates += 1;
                continue;
            }

            let classification = classify(event, &self.categories);
            let category = match classification.category {
                Some(category) if classification.eligible => category,
                _ => {
                    debug!(pass_id, event_id = %event.id, kind = ?event.kind, "not eligible");
                    report.ineligible += 1;
                    continue;
                }
            };

            let existing = known.get(&event.id);
            if existing.is_some_and(SyncRecord::is_complete) {
                debug!(pass_id, event_id = %event.id, "already published");
                report.already_complete += 1;
                continue;
            }

            match self.process(pass_id, event, category, existing).await {
                Ok(Outcome::Published) => report.published += 1,
                Ok(Outcome::AlreadyComplete) => report.already_complete += 1,
                Ok(Outcome::Contended) => report.contended += 1,
                Err(e) => {
                    warn!(pass_id, event_id = %event.id, kind = e.kind(), error = %e, "event failed");
                    report.failures.push(EventFailure {
                        event_id: event.id.clone(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            pass_id,
            published = report.published,
            failed = report.failures.len(),
            "sync pass finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        pass_id: &str,
        event: &Event,
        category: Category,
        existing: Option<&SyncRecord>,
    ) -> Result<Outcome> {
        match existing {
            Some(record) => {
                info!(pass_id, event_id = %event.id, first_seen = record.created_at, "retrying")
            }
            None => {
                let (record, created) = self
                    .ledger
                    .lookup_or_create(&event.id, &event.snapshot(), now_millis())
                    .await?;
                if record.is_complete() {
                    return Ok(Outcome::AlreadyComplete);
                }
                if created {
                    info!(pass_id, event_id = %event.id, %category, "first time seeing event");
                } else {
                    info!(pass_id, event_id = %event.id, "created by a concurrent pass, retrying");
                }
            }
        }

        let event = self.source.enrich(event.clone()).await?;
        let base = resolve_base(self.source.as_ref(), &event).await?;
        let request = compose(self.source.as_ref(), &event, category, &base, &self.categories);

        match self
            .ledger
            .claim(&event.id, pass_id, now_millis(), self.options.claim_lease)
            .await?
        {
            ClaimOutcome::Claimed(_) => {}
            ClaimOutcome::AlreadyComplete => {
                debug!(pass_id, event_id = %event.id, "completed by a concurrent pass");
                return Ok(Outcome::AlreadyComplete);
            }
            ClaimOutcome::HeldElsewhere { owner } => {
                info!(pass_id, event_id = %event.id, %owner, "claimed by another pass, skipping");
                return Ok(Outcome::Contended);
            }
        }

        let result = match self.publisher.publish(&request).await {
            Ok(result) => result,
            Err(e) => {
                self.release(pass_id, &event.id).await;
                return Err(e.into());
            }
        };
        info!(pass_id, event_id = %event.id, location = %result.location, "published");

        self.ledger
            .mark_complete(&event.id, pass_id, &result, now_millis())
            .await
            .inspect_err(|e| {
                error!(pass_id, event_id = %event.id, error = %e, "published but not recorded")
            })?;
        Ok(Outcome::Published)
    }

    /// Drop our claim so the next pass can retry without waiting out the lease.
    async fn release(&self, pass_id: &str, event_id: &str) {
        if let Err(e) = self.ledger.release(event_id, pass_id, now_millis()).await {
            warn!(pass_id, event_id, error = %e, "could not release claim");
        }
    }
}

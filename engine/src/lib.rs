//! # Backfeed Engine
//!
//! Relays responses observed on social platforms (likes, comments, shares,
//! RSVPs, check-ins) into new posts on one owned web site, publishing each
//! source event **at most once** across retries, duplicate deliveries and
//! partial failures.
//!
//! ## Design Principles
//!
//! - **No direct IO**: the engine talks to the world only through the
//!   [`Source`], [`Ledger`] and [`Publisher`] traits
//! - **Ledger decides**: whether an event is published, retried or skipped is
//!   a function of its [`SyncRecord`] alone
//! - **Sequential passes**: events within a pass are processed in fetch order
//!
//! ## Core Concepts
//!
//! ### Events
//!
//! Sources normalize platform activity into [`Event`]s. The [`classify`]
//! function maps each one to a [`Category`] and checks it against the
//! operator's [`CategoryMap`].
//!
//! ### Sync Records
//!
//! The [`Ledger`] keeps one [`SyncRecord`] per event id:
//! - created `started` the first time an eligible event is seen
//! - claimed by exactly one pass before publishing
//! - moved to `complete` after a successful publish, then never touched again
//!
//! ### Passes
//!
//! [`SyncDriver::run_pass`] fetches, filters, renders, publishes and records.
//! One event's failure never blocks the others; the returned [`PassReport`]
//! says whether any event failed.
//!
//! ## Quick Start
//!
//! ```rust
//! use backfeed_engine::{classify, Category, CategoryMap, Event, EventType};
//!
//! let categories: CategoryMap = "like=likes,comment=replies".parse().unwrap();
//!
//! let reply = Event::new("evt-1", EventType::Like).as_reply();
//! let result = classify(&reply, &categories);
//! assert_eq!(result.category, Some(Category::Comment));
//! assert!(result.eligible);
//!
//! let share = Event::new("evt-2", EventType::Share);
//! assert!(!classify(&share, &categories).eligible);
//! ```

pub mod classify;
pub mod error;
pub mod event;
pub mod ledger;
pub mod publish;
pub mod record;
pub mod render;
pub mod source;
pub mod sync;

// Re-export main types at crate root
pub use classify::{classify, Category, CategoryMap, Classification};
pub use error::Error;
pub use event::{Event, EventType, Person, Place};
pub use ledger::{Ledger, MemoryLedger};
pub use publish::{
    PublishError, PublishErrorKind, PublishRequest, PublishResult, Publisher, Relations,
};
pub use record::{ClaimOutcome, SyncRecord, SyncStatus};
pub use render::{cite_markup, compose, render, resolve_base, title_for, CheckinFields};
pub use source::Source;
pub use sync::{EventFailure, PassReport, SyncDriver, SyncOptions};

/// Type aliases for clarity
pub type EventId = String;
pub type Timestamp = u64;

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

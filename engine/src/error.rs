//! Error types for the backfeed engine.

use crate::publish::PublishError;
use crate::EventId;
use thiserror::Error;

/// All possible errors from the backfeed engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Ledger errors
    #[error("sync record already complete: {0}")]
    AlreadyComplete(EventId),

    #[error("sync record not found: {0}")]
    RecordNotFound(EventId),

    #[error("storage error: {0}")]
    Storage(String),

    // Per-event errors
    #[error("base object {reference} for event {event_id} could not be resolved: {reason}")]
    BaseNotFound {
        event_id: EventId,
        reference: String,
        reason: String,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),

    // Pass-level errors
    #[error("source error: {0}")]
    Source(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable name, used in pass reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AlreadyComplete(_) => "already_complete",
            Error::RecordNotFound(_) => "record_not_found",
            Error::Storage(_) => "storage",
            Error::BaseNotFound { .. } => "base_not_found",
            Error::Publish(e) => e.kind().as_str(),
            Error::Source(_) => "source",
            Error::Config(_) => "config",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::AlreadyComplete("evt-1".into());
        assert_eq!(err.to_string(), "sync record already complete: evt-1");

        let err = Error::BaseNotFound {
            event_id: "evt-2".into(),
            reference: "post-9".into(),
            reason: "404".into(),
        };
        assert_eq!(
            err.to_string(),
            "base object post-9 for event evt-2 could not be resolved: 404"
        );

        let err = Error::from(PublishError::Transient("timed out".into()));
        assert_eq!(err.to_string(), "transient publish failure: timed out");
    }

    #[test]
    fn error_kind() {
        assert_eq!(Error::Storage("down".into()).kind(), "storage");
        assert_eq!(
            Error::from(PublishError::Permanent("400".into())).kind(),
            "permanent"
        );
        assert_eq!(
            Error::from(PublishError::Transient("reset".into())).kind(),
            "transient"
        );
    }
}

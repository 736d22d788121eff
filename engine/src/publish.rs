//! Publisher contract.
//!
//! The engine hands a fully rendered [`PublishRequest`] to a [`Publisher`].
//! Endpoint and credentials belong to the implementation. Failures come back
//! classified as transient or permanent; the sync driver treats both the same
//! way (the record stays `started`), the kind is carried for observability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured relationship fields sent alongside the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Relations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsvp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// One post to create on the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target-site category label; `None` sends no category
    pub category_label: Option<String>,
    /// Rendered HTML body
    pub content: String,
    /// Human-readable title
    pub name: Option<String>,
    pub relations: Relations,
    pub photo: Option<String>,
}

/// What the target site returned for a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Location of the created resource
    pub location: String,
    /// Response body, verbatim
    pub body: String,
}

/// Failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishErrorKind {
    Transient,
    Permanent,
}

impl PublishErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishErrorKind::Transient => "transient",
            PublishErrorKind::Permanent => "permanent",
        }
    }
}

/// A failed publish call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Connectivity, timeout or server-side trouble
    #[error("transient publish failure: {0}")]
    Transient(String),
    /// Rejected request or malformed response
    #[error("permanent publish failure: {0}")]
    Permanent(String),
}

impl PublishError {
    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PublishError::Transient(_) => PublishErrorKind::Transient,
            PublishError::Permanent(_) => PublishErrorKind::Permanent,
        }
    }
}

/// Creates posts on the target site.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, PublishError>;
}

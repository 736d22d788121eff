//! Facebook webhook handling.
//!
//! Facebook verifies a subscription with a `GET` carrying `hub.*` query
//! parameters, then `POST`s change notifications. A notification only says
//! that something changed, so a feed change is treated as a trigger for a
//! normal pass.

use crate::error::{AppError, Result};
use serde::Deserialize;

/// Query parameters of a subscription verification request.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// A change notification.
#[derive(Debug, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<NotificationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationEntry {
    #[serde(default)]
    pub changed_fields: Vec<String>,
}

impl Notification {
    /// True when the first entry reports a change to the user's feed.
    pub fn is_feed_change(&self) -> bool {
        self.object == "user"
            && self
                .entry
                .first()
                .is_some_and(|entry| entry.changed_fields.iter().any(|f| f == "feed"))
    }
}

/// Answer a verification request with its challenge.
pub fn handle_verify(query: VerifyQuery, expected: Option<&str>) -> Result<String> {
    let Some(expected) = expected else {
        return Err(AppError::Forbidden);
    };
    if query.mode.as_deref().is_some_and(|mode| mode != "subscribe") {
        return Err(AppError::BadRequest("unsupported hub.mode".into()));
    }
    if query.verify_token.as_deref() != Some(expected) {
        tracing::warn!("webhook verification with wrong token");
        return Err(AppError::Forbidden);
    }
    let challenge = query
        .challenge
        .ok_or_else(|| AppError::BadRequest("missing hub.challenge".into()))?;
    Ok(format!("{challenge}\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(token: Option<&str>, challenge: Option<&str>) -> VerifyQuery {
        VerifyQuery {
            mode: Some("subscribe".into()),
            verify_token: token.map(str::to_string),
            challenge: challenge.map(str::to_string),
        }
    }

    #[test]
    fn verify_echoes_challenge() {
        let body = handle_verify(query(Some("tok"), Some("1158201444")), Some("tok")).unwrap();
        assert_eq!(body, "1158201444\r\n");
    }

    #[test]
    fn verify_rejects_wrong_or_unconfigured_token() {
        assert!(matches!(
            handle_verify(query(Some("nope"), Some("1")), Some("tok")),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            handle_verify(query(Some("tok"), Some("1")), None),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            handle_verify(query(Some("tok"), None), Some("tok")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn feed_change_detection() {
        let feed: Notification = serde_json::from_value(json!({
            "object": "user",
            "entry": [{"uid": "1", "changed_fields": ["feed", "photos"]}]
        }))
        .unwrap();
        assert!(feed.is_feed_change());

        let page: Notification = serde_json::from_value(json!({
            "object": "page",
            "entry": [{"changed_fields": ["feed"]}]
        }))
        .unwrap();
        assert!(!page.is_feed_change());

        let empty: Notification = serde_json::from_value(json!({"object": "user"})).unwrap();
        assert!(!empty.is_feed_change());
    }
}

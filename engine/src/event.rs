//! Normalized social platform events.
//!
//! Sources translate whatever their platform returns into [`Event`]s. The
//! engine never mutates an event; it only reads it, snapshots it into the
//! ledger and renders it.

use crate::EventId;
use serde::{Deserialize, Serialize};

/// Platform-reported kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Like,
    Comment,
    Share,
    RsvpYes,
    RsvpNo,
    RsvpMaybe,
    Checkin,
    Other,
}

/// A place attached to a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
}

/// A person tagged in, or authoring, an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
}

/// A normalized record of one social platform activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Globally unique per source; the ledger key
    pub id: EventId,
    /// Platform-reported type
    pub kind: EventType,
    /// Reply or mention relationship to another post
    #[serde(default)]
    pub is_reply: bool,
    /// The event's own text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Id of the object this event reacts to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_object_id: Option<String>,
    /// Canonical URL of the event itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// RFC 3339 publication time as reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Place>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tagged: Vec<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Opaque platform payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Event {
    /// Create a bare event; the remaining fields are filled with the builder methods.
    pub fn new(id: impl Into<EventId>, kind: EventType) -> Self {
        Self {
            id: id.into(),
            kind,
            is_reply: false,
            content: None,
            referenced_object_id: None,
            url: None,
            published: None,
            author: None,
            location: None,
            tagged: Vec::new(),
            photo_url: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_reference(mut self, id: impl Into<String>) -> Self {
        self.referenced_object_id = Some(id.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn as_reply(mut self) -> Self {
        self.is_reply = true;
        self
    }

    /// Text content with surrounding whitespace removed, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Payload stored in the ledger the first time this event is seen.
    ///
    /// Falls back to the normalized event when the source supplied no raw blob.
    pub fn snapshot(&self) -> serde_json::Value {
        if self.raw.is_null() {
            serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
        } else {
            self.raw.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_wire_names() {
        assert_eq!(
            serde_json::to_value(EventType::RsvpMaybe).unwrap(),
            json!("rsvp-maybe")
        );
        let parsed: EventType = serde_json::from_value(json!("checkin")).unwrap();
        assert_eq!(parsed, EventType::Checkin);
    }

    #[test]
    fn blank_content_is_no_text() {
        let event = Event::new("a", EventType::Comment).with_content("   \n");
        assert_eq!(event.text(), None);

        let event = Event::new("a", EventType::Comment).with_content(" hi ");
        assert_eq!(event.text(), Some("hi"));
    }

    #[test]
    fn snapshot_prefers_raw_payload() {
        let event = Event::new("a", EventType::Like).with_raw(json!({"id": "fb_1"}));
        assert_eq!(event.snapshot(), json!({"id": "fb_1"}));

        let event = Event::new("b", EventType::Like);
        let snapshot = event.snapshot();
        assert_eq!(snapshot["id"], "b");
        assert_eq!(snapshot["kind"], "like");
    }

    #[test]
    fn deserialize_minimal_event() {
        let event: Event = serde_json::from_value(json!({
            "id": "evt-1",
            "kind": "share",
            "referencedObjectId": "post-1"
        }))
        .unwrap();

        assert!(!event.is_reply);
        assert!(event.tagged.is_empty());
        assert_eq!(event.referenced_object_id.as_deref(), Some("post-1"));
    }
}

//! Event classification.
//!
//! Decides which syndication [`Category`] an event falls into and whether the
//! operator's [`CategoryMap`] allows that category to be published at all.
//! Pure logic: no IO, no clock.

use crate::error::{Error, Result};
use crate::event::{Event, EventType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Syndication category used to tag the published post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Like,
    Comment,
    Share,
    RsvpYes,
    RsvpNo,
    RsvpMaybe,
    Checkin,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Like,
        Category::Comment,
        Category::Share,
        Category::RsvpYes,
        Category::RsvpNo,
        Category::RsvpMaybe,
        Category::Checkin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Like => "like",
            Category::Comment => "comment",
            Category::Share => "share",
            Category::RsvpYes => "rsvp-yes",
            Category::RsvpNo => "rsvp-no",
            Category::RsvpMaybe => "rsvp-maybe",
            Category::Checkin => "checkin",
        }
    }

    /// The category an event type maps to before any override.
    pub fn from_event_type(kind: EventType) -> Option<Self> {
        match kind {
            EventType::Like => Some(Category::Like),
            EventType::Comment => Some(Category::Comment),
            EventType::Share => Some(Category::Share),
            EventType::RsvpYes => Some(Category::RsvpYes),
            EventType::RsvpNo => Some(Category::RsvpNo),
            EventType::RsvpMaybe => Some(Category::RsvpMaybe),
            EventType::Checkin => Some(Category::Checkin),
            EventType::Other => None,
        }
    }

    /// RSVP value for `p-rsvp` markup and the `rsvp` publish field.
    pub fn rsvp_value(self) -> Option<&'static str> {
        match self {
            Category::RsvpYes => Some("yes"),
            Category::RsvpNo => Some("no"),
            Category::RsvpMaybe => Some("maybe"),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown category: {s}")))
    }
}

/// Operator allow-list of categories, each with an optional target-site label.
///
/// A category absent from the map is never syndicated. A category present
/// without a label is syndicated but published with no category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    labels: BTreeMap<Category, Option<String>>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a category, publishing it under `label` when given.
    pub fn allow(mut self, category: Category, label: Option<&str>) -> Self {
        self.labels
            .insert(category, label.map(str::to_string).filter(|l| !l.is_empty()));
        self
    }

    pub fn is_allowed(&self, category: Category) -> bool {
        self.labels.contains_key(&category)
    }

    /// Target-site label for a category, if one is configured.
    pub fn label(&self, category: Category) -> Option<&str> {
        self.labels.get(&category).and_then(|l| l.as_deref())
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.labels.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromStr for CategoryMap {
    type Err = Error;

    /// Parse `like=likes,comment=replies,share` style configuration.
    fn from_str(s: &str) -> Result<Self> {
        let mut map = CategoryMap::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, label) = match entry.split_once('=') {
                Some((name, label)) => (name.trim(), Some(label.trim())),
                None => (entry, None),
            };
            map = map.allow(name.parse()?, label);
        }
        Ok(map)
    }
}

impl fmt::Display for CategoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (category, label) in &self.labels {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match label {
                Some(label) => write!(f, "{category}={label}")?,
                None => write!(f, "{category}")?,
            }
        }
        Ok(())
    }
}

/// Outcome of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Resolved category, `None` for event types with no syndication meaning
    pub category: Option<Category>,
    /// Whether the resolved category is allow-listed
    pub eligible: bool,
}

/// Classify an event against the allow-list.
///
/// Replies are always `comment`, whatever the platform reported.
pub fn classify(event: &Event, categories: &CategoryMap) -> Classification {
    let category = if event.is_reply {
        Some(Category::Comment)
    } else {
        Category::from_event_type(event.kind)
    };

    Classification {
        category,
        eligible: category.is_some_and(|c| categories.is_allowed(c)),
    }
}

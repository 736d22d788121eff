//! Granary-compatible ActivityStreams 1.0 source.
//!
//! Granary exposes many silos behind one path scheme:
//! `{base}/@me/{@self|@all}/@app/[{activity id}]?format=as1`, answering with
//! `{"items": [activity, ...]}`.

use super::{get_json, parse_url};
use crate::config::GranaryConfig;
use async_trait::async_trait;
use backfeed_engine::{cite_markup, Error, Event, EventType, Person, Place, Source};
use reqwest::{Client, Url};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct GranarySource {
    client: Client,
    config: GranaryConfig,
}

impl GranarySource {
    pub fn new(client: Client, config: GranaryConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, group: &str, activity_id: Option<&str>) -> Result<Url, Error> {
        let mut url = parse_url(self.config.base_url.trim_end_matches('/'))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("{} cannot be a base URL", self.config.base_url)))?;
            segments.pop_if_empty().extend(["@me", group, "@app"]);
            // Trailing slash keeps the collection form when no id is given
            segments.push(activity_id.unwrap_or(""));
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "as1");
            if let Some(token) = &self.config.access_token {
                query.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    async fn items(&self, url: Url) -> Result<Vec<Value>, Error> {
        let mut response = get_json(&self.client, url).await?;
        match response["items"].take() {
            Value::Array(items) => Ok(items),
            _ => Err(Error::Source("response has no items array".into())),
        }
    }
}

fn string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn person(actor: &Value) -> Option<Person> {
    let name = actor["displayName"]
        .as_str()
        .or_else(|| actor["username"].as_str())?;
    Some(Person {
        id: string(&actor["id"]),
        name: name.to_string(),
        url: string(&actor["url"]).unwrap_or_default(),
    })
}

fn first_reply_target(object: &Value) -> Option<String> {
    let target = match &object["inReplyTo"] {
        Value::Array(targets) => targets.first()?,
        other => other,
    };
    string(&target["id"]).or_else(|| string(&target["url"]))
}

/// Normalize one AS1 activity. Activities without any id are dropped.
pub fn activity_to_event(activity: &Value) -> Option<Event> {
    let object = &activity["object"];
    let verb = activity["verb"].as_str().unwrap_or("post");

    let (kind, reference) = match verb {
        "like" | "favorite" | "react" => (EventType::Like, string(&object["id"])),
        "share" => (EventType::Share, string(&object["id"])),
        "rsvp-yes" => (EventType::RsvpYes, string(&object["id"])),
        "rsvp-no" => (EventType::RsvpNo, string(&object["id"])),
        "rsvp-maybe" | "rsvp-interested" => (EventType::RsvpMaybe, string(&object["id"])),
        "checkin" => (EventType::Checkin, None),
        _ => match first_reply_target(object) {
            Some(target) => (EventType::Comment, Some(target)),
            None if object["objectType"] == "comment" => (EventType::Comment, None),
            None => (EventType::Other, None),
        },
    };

    let id = string(&activity["id"]).or_else(|| string(&object["id"]))?;
    let is_post = matches!(kind, EventType::Comment | EventType::Other | EventType::Checkin);
    let body = if is_post { object } else { activity };

    let mut event = Event::new(id, kind).with_raw(activity.clone());
    event.is_reply = kind == EventType::Comment;
    event.content = string(&body["content"]);
    event.url = string(&activity["url"]).or_else(|| string(&object["url"]));
    event.referenced_object_id = reference;
    event.published = string(&activity["published"]).or_else(|| string(&object["published"]));
    event.author = person(&activity["actor"]).or_else(|| person(&object["author"]));
    event.location = object["location"]["displayName"].as_str().map(|name| Place {
        id: string(&object["location"]["id"]),
        name: name.to_string(),
        url: string(&object["location"]["url"]).unwrap_or_default(),
    });
    event.tagged = object["tags"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|tag| tag["objectType"] == "person")
        .filter_map(person)
        .collect();
    event.photo_url = object["image"]["url"]
        .as_str()
        .or_else(|| object["image"][0]["url"].as_str())
        .map(str::to_string);
    Some(event)
}

/// Normalize a bare AS1 object as a base for rendering.
pub fn object_to_event(object: &Value) -> Option<Event> {
    let id = string(&object["id"]).or_else(|| string(&object["url"]))?;
    let mut event = Event::new(id, EventType::Other).with_raw(object.clone());
    event.content = string(&object["content"]);
    event.url = string(&object["url"]);
    event.published = string(&object["published"]);
    event.author = person(&object["author"]);
    Some(event)
}

#[async_trait]
impl Source for GranarySource {
    fn name(&self) -> &str {
        "granary"
    }

    async fn fetch_activities(
        &self,
        self_only: bool,
        include_reactions: bool,
    ) -> Result<Vec<Event>, Error> {
        let group = if self_only { "@self" } else { "@all" };
        let items = self.items(self.url(group, None)?).await?;

        let events: Vec<Event> = items
            .iter()
            .filter_map(activity_to_event)
            .filter(|event| {
                include_reactions || !matches!(event.kind, EventType::Like | EventType::Share)
            })
            .collect();
        tracing::debug!(group, total = items.len(), kept = events.len(), "fetched activities");
        Ok(events)
    }

    async fn resolve_referenced_object(&self, id: &str) -> Result<Event, Error> {
        let items = self.items(self.url("@all", Some(id))?).await?;
        let first = items
            .first()
            .ok_or_else(|| Error::Source(format!("object {id} not found")))?;

        // Lookups answer with a wrapping activity when the id names one
        let object = if first["object"].is_object() && first["verb"].is_string() {
            &first["object"]
        } else {
            first
        };
        object_to_event(object).ok_or_else(|| Error::Source(format!("object {id} has no id")))
    }

    fn embed_markup(&self, base: &Event) -> String {
        cite_markup(base)
    }
}

//! Facebook Graph API source.

use super::{get_json, parse_url};
use crate::config::FacebookConfig;
use async_trait::async_trait;
use backfeed_engine::{cite_markup, Error, Event, EventType, Person, Place, Source};
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::{Client, Url};
use serde_json::Value;

const SITE: &str = "https://www.facebook.com";
const POST_FIELDS: &str =
    "id,type,message,created_time,from,place,with_tags,parent_id,object_id,full_picture";

/// Reads the account owner's posts, shares and check-ins.
#[derive(Debug, Clone)]
pub struct FacebookSource {
    client: Client,
    config: FacebookConfig,
}

impl FacebookSource {
    pub fn new(client: Client, config: FacebookConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str, fields: &str) -> Result<Url, Error> {
        let mut url = parse_url(&format!(
            "{}/{}",
            self.config.graph_url.trim_end_matches('/'),
            path
        ))?;
        url.query_pairs_mut()
            .append_pair("fields", fields)
            .append_pair("access_token", &self.config.access_token);
        Ok(url)
    }

    /// Source URL of the biggest rendition of a photo object.
    async fn largest_image(&self, object_id: &str) -> Result<Option<String>, Error> {
        let photo = get_json(&self.client, self.url(object_id, "images")?).await?;
        Ok(photo["images"]
            .as_array()
            .into_iter()
            .flatten()
            .max_by_key(|image| image["height"].as_u64().unwrap_or(0))
            .and_then(|image| image["source"].as_str())
            .map(str::to_string))
    }
}

/// `USER_POST` ids map to the canonical permalink.
pub fn post_url(id: &str) -> String {
    match id.split_once('_') {
        Some((user, post)) => format!("{SITE}/{user}/posts/{post}"),
        None => format!("{SITE}/{id}"),
    }
}

fn created_time(post: &Value) -> Option<DateTime<FixedOffset>> {
    let raw = post["created_time"].as_str()?;
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

fn profile(value: &Value) -> Option<Person> {
    let name = value["name"].as_str()?;
    let id = value["id"].as_str();
    Some(Person {
        id: id.map(str::to_string),
        name: name.to_string(),
        url: id.map_or_else(|| SITE.to_string(), |id| format!("{SITE}/{id}")),
    })
}

/// Normalize one Graph API post. Posts without an id are dropped.
pub fn post_to_event(post: &Value) -> Option<Event> {
    let id = post["id"].as_str()?;
    let url = post_url(id);

    let kind = if post["parent_id"].is_string() {
        EventType::Share
    } else if post["place"].is_object() {
        EventType::Checkin
    } else {
        EventType::Other
    };

    let mut event = Event::new(url.clone(), kind)
        .with_url(url)
        .with_raw(post.clone());
    event.content = post["message"].as_str().map(str::to_string);
    event.referenced_object_id = post["parent_id"].as_str().map(str::to_string);
    event.published = created_time(post)
        .map(|t| t.to_rfc3339())
        .or_else(|| post["created_time"].as_str().map(str::to_string));
    event.author = profile(&post["from"]);
    event.location = post["place"]["name"].as_str().map(|name| {
        let place_id = post["place"]["id"].as_str();
        Place {
            id: place_id.map(str::to_string),
            name: name.to_string(),
            url: place_id.map_or_else(|| SITE.to_string(), |id| format!("{SITE}/{id}")),
        }
    });
    event.tagged = post["with_tags"]["data"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(profile)
        .collect();
    event.photo_url = post["full_picture"].as_str().map(str::to_string);
    Some(event)
}

/// Photo object whose full-size image is worth a lookup.
fn photo_object_id(post: &Value) -> Option<&str> {
    if post["type"] != "photo" {
        return None;
    }
    post["object_id"].as_str()
}

#[async_trait]
impl Source for FacebookSource {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn fetch_activities(
        &self,
        self_only: bool,
        include_reactions: bool,
    ) -> Result<Vec<Event>, Error> {
        let path = if self_only { "me/posts" } else { "me/feed" };
        let response = get_json(&self.client, self.url(path, POST_FIELDS)?).await?;
        let posts = response["data"]
            .as_array()
            .ok_or_else(|| Error::Source("feed response has no data array".into()))?;

        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.lookback.as_secs() as i64);
        let mut events = Vec::with_capacity(posts.len());
        for post in posts {
            // Posts without a readable creation time are never trusted as recent
            if !created_time(post).is_some_and(|t| t >= cutoff) {
                continue;
            }
            if !include_reactions && post["parent_id"].is_string() {
                continue;
            }
            if let Some(event) = post_to_event(post) {
                events.push(event);
            }
        }

        tracing::debug!(path, total = posts.len(), recent = events.len(), "fetched facebook posts");
        Ok(events)
    }

    async fn resolve_referenced_object(&self, id: &str) -> Result<Event, Error> {
        let post = get_json(&self.client, self.url(id, POST_FIELDS)?).await?;
        post_to_event(&post).ok_or_else(|| Error::Source(format!("object {id} has no id")))
    }

    async fn enrich(&self, mut event: Event) -> Result<Event, Error> {
        let Some(object_id) = photo_object_id(&event.raw) else {
            return Ok(event);
        };
        match self.largest_image(object_id).await {
            Ok(Some(url)) => event.photo_url = Some(url),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(event_id = %event.id, object_id, error = %e, "photo lookup failed")
            }
        }
        Ok(event)
    }

    fn embed_markup(&self, base: &Event) -> String {
        cite_markup(base)
    }
}

//! Micropub client for the owned site.

use async_trait::async_trait;
use backfeed_engine::{PublishError, PublishRequest, PublishResult, Publisher};
use reqwest::header::LOCATION;
use reqwest::Client;
use std::time::Duration;

/// Publishes posts by form-encoded Micropub `h=entry` requests.
#[derive(Debug, Clone)]
pub struct MicropubPublisher {
    client: Client,
    endpoint: String,
    token: String,
}

impl MicropubPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("backfeed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    /// Form fields for one request, in a stable order.
    pub fn form(&self, request: &PublishRequest) -> Vec<(&'static str, String)> {
        let relations = &request.relations;
        let optional = [
            ("name", &request.name),
            ("category", &request.category_label),
            ("in-reply-to", &relations.in_reply_to),
            ("like-of", &relations.like_of),
            ("repost-of", &relations.repost_of),
            ("rsvp", &relations.rsvp),
            ("published", &relations.published),
            ("photo", &request.photo),
        ];

        let mut fields = vec![("h", "entry".to_string()), ("content", request.content.clone())];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
        );
        fields.push(("access_token", self.token.clone()));
        fields
    }
}

/// Some endpoints answer with a JSON body naming the new post instead of a
/// `Location` header.
fn location_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["url", "URL", "location"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_string))
}

#[async_trait]
impl Publisher for MicropubPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&self.form(request))
            .send()
            .await
            .map_err(|e| PublishError::Transient(format!("sending to {}: {e}", self.endpoint)))?;

        let status = response.status();
        let header_location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transient(format!("reading response body: {e}")))?;

        if status.is_server_error() {
            return Err(PublishError::Transient(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(PublishError::Permanent(format!("{status}: {body}")));
        }

        let location = header_location
            .or_else(|| location_from_body(&body))
            .ok_or_else(|| {
                PublishError::Permanent(format!("{status} response names no post location"))
            })?;

        tracing::debug!(%status, %location, "micropub accepted post");
        Ok(PublishResult { location, body })
    }
}

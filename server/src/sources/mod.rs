//! Social platform sources.

mod facebook;
mod granary;

pub use facebook::FacebookSource;
pub use granary::GranarySource;

use crate::config::SourceConfig;
use backfeed_engine::{Error, Source};
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured source.
pub fn from_config(config: &SourceConfig, timeout: Duration) -> Result<Arc<dyn Source>, Error> {
    let client = http_client(timeout)?;
    Ok(match config {
        SourceConfig::Facebook(fb) => Arc::new(FacebookSource::new(client, fb.clone())),
        SourceConfig::Granary(granary) => Arc::new(GranarySource::new(client, granary.clone())),
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("backfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("building HTTP client: {e}")))
}

/// GET a JSON document, mapping every failure to [`Error::Source`].
pub(crate) async fn get_json(client: &Client, url: Url) -> Result<serde_json::Value, Error> {
    let shown = redact(&url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Source(format!("GET {shown}: {}", e.without_url())))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Source(format!("GET {shown}: {status}: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Source(format!("GET {shown}: invalid JSON: {}", e.without_url())))
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|e| Error::Config(format!("invalid URL {raw}: {e}")))
}

/// URL without its query string, so tokens never reach the logs.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

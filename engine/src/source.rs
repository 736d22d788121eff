//! Social platform capability.

use crate::error::Result;
use crate::event::Event;
use async_trait::async_trait;

/// One social platform the engine can read responses from.
///
/// Implementations own their credentials and HTTP clients. Errors should be
/// reported as [`crate::Error::Source`].
#[async_trait]
pub trait Source: Send + Sync {
    /// Short platform name used in logs.
    fn name(&self) -> &str;

    /// Recent activity, in whatever order the platform returns it.
    async fn fetch_activities(&self, self_only: bool, include_reactions: bool)
        -> Result<Vec<Event>>;

    /// Fetch the object an event refers to.
    async fn resolve_referenced_object(&self, id: &str) -> Result<Event>;

    /// Fill in details that cost extra platform calls, such as photo URLs.
    ///
    /// Called only for eligible events that still need publishing, so
    /// already-published events cost nothing beyond the fetch.
    async fn enrich(&self, event: Event) -> Result<Event> {
        Ok(event)
    }

    /// Platform-specific HTML embedding a base object.
    ///
    /// The returned markup is inserted verbatim into the post body.
    fn embed_markup(&self, base: &Event) -> String;
}

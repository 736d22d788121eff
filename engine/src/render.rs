//! Content rendering.
//!
//! Turns an event and its base object into the HTML body of the target-site
//! post, plus the title and relationship fields that travel with it.
//!
//! # Layout
//!
//! ```text
//! comment:          EMBED \n TEXT
//! everything else:  TEXT \n EMBED
//!
//! EMBED = base object markup
//!         relationship link   (u-like-of | u-repost-of | u-in-reply-to)
//!         p-rsvp data         (RSVPs only)
//!         origin link         (u-syndication -> the event's own URL)
//! ```

use crate::classify::{Category, CategoryMap};
use crate::error::{Error, Result};
use crate::event::{Event, Person, Place};
use crate::publish::{PublishRequest, Relations};
use crate::source::Source;
use maud::{html, Markup, PreEscaped};

const TITLE_MAX_CHARS: usize = 70;

/// Fetch the object `event` reacts to, or return the event itself.
pub async fn resolve_base(source: &dyn Source, event: &Event) -> Result<Event> {
    let Some(reference) = &event.referenced_object_id else {
        return Ok(event.clone());
    };

    source
        .resolve_referenced_object(reference)
        .await
        .map_err(|e| Error::BaseNotFound {
            event_id: event.id.clone(),
            reference: reference.clone(),
            reason: e.to_string(),
        })
}

/// Typed fields of a check-in block.
#[derive(Debug, Clone, Copy)]
pub struct CheckinFields<'a> {
    pub location: &'a Place,
    pub with: &'a [Person],
}

impl<'a> CheckinFields<'a> {
    pub fn from_event(event: &'a Event) -> Option<Self> {
        event.location.as_ref().map(|location| Self {
            location,
            with: &event.tagged,
        })
    }
}

/// `<blockquote class="h-as-checkin">At PLACE with A, B.</blockquote>`
pub fn checkin_markup(fields: CheckinFields<'_>) -> Markup {
    html! {
        blockquote class="h-as-checkin" {
            "At "
            a class="h-card p-location" href=(fields.location.url) { (fields.location.name) }
            @if !fields.with.is_empty() {
                " with "
                @for (i, person) in fields.with.iter().enumerate() {
                    @if i > 0 { ", " }
                    a class="h-card" href=(person.url) { (person.name) }
                }
            }
            "."
        }
    }
}

/// Generic `h-cite` quote of a base object, for sources without a native embed.
pub fn cite_markup(base: &Event) -> String {
    html! {
        blockquote class="h-cite" {
            @if let Some(author) = &base.author {
                a class="p-author h-card" href=(author.url) { (author.name) }
                ": "
            }
            @if let Some(text) = base.text() {
                span class="e-content" { (text) }
            }
            @if let Some(url) = &base.url {
                " "
                a class="u-url" href=(url) { "(original)" }
            }
        }
    }
    .into_string()
}

/// Canned text for categories whose events usually carry none.
pub fn default_phrase(category: Category) -> Option<&'static str> {
    match category {
        Category::Share => Some("Reposted."),
        Category::RsvpYes => Some("RSVPed yes."),
        Category::RsvpNo => Some("RSVPed no."),
        Category::RsvpMaybe => Some("RSVPed maybe."),
        Category::Like | Category::Comment | Category::Checkin => None,
    }
}

fn relation_class(category: Category) -> Option<&'static str> {
    match category {
        Category::Like => Some("u-like-of"),
        Category::Share => Some("u-repost-of"),
        Category::Comment | Category::RsvpYes | Category::RsvpNo | Category::RsvpMaybe => {
            Some("u-in-reply-to")
        }
        Category::Checkin => None,
    }
}

/// URL of the base object when it is a different object from the event.
fn base_url<'a>(event: &Event, base: &'a Event) -> Option<&'a str> {
    if base.id == event.id {
        None
    } else {
        base.url.as_deref()
    }
}

fn embed_block(source: &dyn Source, event: &Event, category: Category, base: &Event) -> Markup {
    let base_markup = if category == Category::Checkin {
        CheckinFields::from_event(base).map(checkin_markup)
    } else if base.id != event.id {
        Some(PreEscaped(source.embed_markup(base)))
    } else {
        None
    };
    let relation = relation_class(category).zip(base_url(event, base));

    html! {
        @if let Some(markup) = base_markup { (markup) "\n" }
        @if let Some((class, url)) = relation { a class=(class) href=(url) {} "\n" }
        @if let Some(value) = category.rsvp_value() { data class="p-rsvp" value=(value) {} "\n" }
        @if let Some(url) = &event.url { a class="u-syndication" href=(url) {} "\n" }
    }
}

/// Render the post body for `event` in `category`, given its resolved base.
pub fn render(source: &dyn Source, event: &Event, category: Category, base: &Event) -> String {
    let embed = embed_block(source, event, category, base);
    let text = event.text().or_else(|| default_phrase(category));
    let text = html! { @if let Some(text) = text { (text) "\n" } };

    let body = if category == Category::Comment {
        html! { (embed) (text) }
    } else {
        html! { (text) (embed) }
    };
    body.into_string()
}

/// Post title derived from the base object's text.
pub fn title_for(base: &Event) -> Option<String> {
    let Some(text) = base.text() else {
        return base.url.clone();
    };

    let first_line = text.lines().next().unwrap_or_default();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return Some(collapsed);
    }

    let mut title: String = collapsed.chars().take(TITLE_MAX_CHARS - 1).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    Some(title)
}

/// Structured relationship fields for the publish call.
pub fn relations_for(category: Category, event: &Event, base: &Event) -> Relations {
    let target = base_url(event, base).map(str::to_string);
    let mut relations = Relations {
        rsvp: category.rsvp_value().map(str::to_string),
        published: event.published.clone(),
        ..Default::default()
    };

    match category {
        Category::Like => relations.like_of = target,
        Category::Share => relations.repost_of = target,
        Category::Comment | Category::RsvpYes | Category::RsvpNo | Category::RsvpMaybe => {
            relations.in_reply_to = target
        }
        Category::Checkin => {}
    }
    relations
}

/// Everything the publisher needs for one event.
pub fn compose(
    source: &dyn Source,
    event: &Event,
    category: Category,
    base: &Event,
    categories: &CategoryMap,
) -> PublishRequest {
    PublishRequest {
        category_label: categories.label(category).map(str::to_string),
        content: render(source, event, category, base),
        name: title_for(base),
        relations: relations_for(category, event, base),
        photo: event.photo_url.clone(),
    }
}

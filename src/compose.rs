use thiserror::Error;

use crate::config::ReplyConfig;
use crate::registry::BikeRecord;

/// A bike record that can't be described or linked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("bike record is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Lowercase the first frame color and rewrite the two registry color values
/// that read poorly in a sentence: a `silver` prefix becomes `gray`, a
/// `stickers` prefix is dropped. Remainders are preserved untouched.
fn normalize_color(raw: &str) -> String {
    let color = raw.to_lowercase();
    if let Some(rest) = color.strip_prefix("silver") {
        format!("gray{rest}")
    } else if let Some(rest) = color.strip_prefix("stickers") {
        rest.to_string()
    } else {
        color
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ComposeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ComposeError::MissingField(field)),
    }
}

/// Fit a human-readable description of the bike into `max_chars` characters.
///
/// Candidates are tried most-descriptive first; the first that fits wins.
/// A shrinking budget degrades the description down to an empty slug, at
/// which point the reply carries only handle, status and link.
pub fn bike_desc(max_chars: usize, bike: &BikeRecord) -> Result<String, ComposeError> {
    let color = normalize_color(
        bike.first_color()
            .ok_or(ComposeError::MissingField("frame_colors"))?,
    );
    let manufacturer = required(bike.manufacturer_name.as_deref(), "manufacturer_name")?;
    let model = required(bike.frame_model.as_deref(), "frame_model")?;

    let candidates = [
        format!("{color} {manufacturer} {model}"),
        format!("{manufacturer} {model}"),
        format!("{color} {model}"),
        format!("{color} {manufacturer}"),
        format!("a {model}"),
        format!("a {manufacturer}"),
        format!("{color} bike"),
    ];

    Ok(candidates
        .into_iter()
        .find(|c| c.chars().count() <= max_chars)
        .unwrap_or_default())
}

/// Status wording appended after the description.
fn status_suffix(stolen: bool) -> &'static str {
    if stolen {
        " listed as STOLEN"
    } else {
        " listed as NOT stolen"
    }
}

/// Build the full reply for one matched bike, plus the media reference to
/// attach when the record carries a photo.
///
/// The description budget is what remains of `total_limit` after the
/// requester handle, the fixed separators, the status suffix, the channel's
/// per-link allowance, and its per-media allowance when a photo is attached.
/// Those allowances come from configuration; the channel itself is never
/// queried.
pub fn found_reply(
    reply: &ReplyConfig,
    requester_handle: &str,
    bike: &BikeRecord,
) -> Result<(String, Option<String>), ComposeError> {
    let url = required(bike.url.as_deref(), "url")?;
    let media_url = bike
        .large_img
        .as_deref()
        .filter(|img| !img.is_empty())
        .map(str::to_string);

    let status = status_suffix(bike.stolen);
    let mut reserved = requester_handle.chars().count()
        + " Found ".len()
        + status.chars().count()
        + 1
        + reply.link_reserve;
    if media_url.is_some() {
        reserved += reply.media_reserve;
    }

    let desc = bike_desc(reply.total_limit.saturating_sub(reserved), bike)?;
    let text = if desc.is_empty() {
        format!("{requester_handle}{status} {url}")
    } else {
        format!("{requester_handle} Found {desc}{status} {url}")
    };

    Ok((text, media_url))
}

//! Raw Apify dataset item → `Item`
//!
//! Field names differ between scraper actors and actor versions, so every
//! lookup walks a list of known aliases and takes the first non-blank value.
//! Items without any usable key are dropped.

use chrono::{DateTime, Utc};
use postrelay_core::traits::{Item, MediaKind, MediaRef};
use serde_json::Value;

const KEY_FIELDS: &[&str] = &["id", "shortCode", "shortcode", "code", "pk"];
const KEY_FALLBACK_FIELDS: &[&str] = &["url", "postUrl", "displayUrl"];
const SHORTCODE_FIELDS: &[&str] = &["shortCode", "shortcode", "code"];
const PERMALINK_FIELDS: &[&str] = &["url", "postUrl", "permalink"];
const CAPTION_FIELDS: &[&str] = &["caption", "text", "title"];
const IMAGE_FIELDS: &[&str] = &["displayUrl", "imageUrl", "thumbnailUrl"];
const VIDEO_FIELDS: &[&str] = &["videoUrl", "video_url"];

/// Normalize one dataset item; `None` when it has no key
pub(crate) fn normalize_item(raw: &Value, profile: &str) -> Option<Item> {
    if !raw.is_object() {
        return None;
    }

    let key = first_id(raw, KEY_FIELDS).or_else(|| first_str(raw, KEY_FALLBACK_FIELDS))?;

    let permalink = first_str(raw, PERMALINK_FIELDS)
        .or_else(|| first_str(raw, SHORTCODE_FIELDS).map(|sc| format!("https://www.instagram.com/p/{}/", sc)))
        .unwrap_or_else(|| format!("https://www.instagram.com/{}/", profile));

    let mut image = first_str(raw, IMAGE_FIELDS);
    let mut video = first_str(raw, VIDEO_FIELDS);

    let mut gallery = Vec::new();
    if let Some(children) = raw.get("childPosts").and_then(Value::as_array) {
        for child in children.iter().filter(|c| c.is_object()) {
            let child_image = first_str(child, &["displayUrl", "imageUrl"]);
            let child_video = first_str(child, &["videoUrl"]);

            if image.is_none() {
                image = child_image.clone();
            }
            if video.is_none() {
                video = child_video.clone();
            }

            match (child_video, child_image) {
                (Some(url), _) => gallery.push(MediaRef::video(url)),
                (None, Some(url)) => gallery.push(MediaRef::image(url)),
                (None, None) => {}
            }
        }
    }

    let mut item = Item::new(key, permalink)
        .with_caption(first_str(raw, CAPTION_FIELDS))
        .with_gallery(gallery)
        .with_posted_at(raw.get("timestamp").and_then(parse_timestamp));

    if let Some(url) = image {
        item = item.with_image(url);
    }
    if let Some(url) = video {
        item = item.with_video(url);
    }
    if raw
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("video"))
    {
        item = item.with_media_kind(MediaKind::Video);
    }

    Some(item)
}

/// First non-blank string among `fields`
fn first_str(raw: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        raw.get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Like `first_str`, but numeric ids are accepted too
fn first_id(raw: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match raw.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// RFC 3339 string or unix seconds
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

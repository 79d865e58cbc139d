//! Item → payload formatting
//!
//! [`PostFormatter::format`] is pure and total: missing fields leave the
//! corresponding payload field empty, they never produce an error or
//! placeholder text.
//!
//! ## Media policy
//!
//! Media is forwarded by reference only, never downloaded.
//!
//! 1. `image_url` becomes the inline preview.
//! 2. `video_url` becomes a clickable fallback link.
//! 3. Gallery slides are listed as numbered links.
//!
//! The total number of references across all three is capped at
//! `max_media_refs`, filled in that order. Gallery links that would push the
//! message content past `max_content_chars` are left out.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::traits::Item;

/// Caption limit (Discord allows 4096 in an embed description)
pub const DEFAULT_MAX_CAPTION_CHARS: usize = 3900;

/// Message content limit (Discord rejects content over 2000)
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 2000;

/// Delivery-ready payload built from one item
///
/// Transport crates map this onto their wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPayload {
    /// Key of the source item
    pub item_key: String,
    /// Headline
    pub title: String,
    /// Canonical link to the post
    pub url: String,
    /// Plain message text shown above the embed
    pub content: String,
    /// Caption, possibly truncated; `None` when the item has no caption
    pub description: Option<String>,
    /// At most one inline preview image
    pub image_url: Option<String>,
    /// At most one fallback link (video that is not played inline)
    pub fallback_link: Option<String>,
    /// Further media links, already counted against the cap
    pub gallery_links: Vec<String>,
    /// Publication time, when known
    pub timestamp: Option<DateTime<Utc>>,
    /// Footer text
    pub footer: String,
    /// Disable audience-wide mention expansion; always true
    pub suppress_mentions: bool,
}

impl FormattedPayload {
    /// Number of media references carried by this payload
    pub fn media_ref_count(&self) -> usize {
        usize::from(self.image_url.is_some())
            + usize::from(self.fallback_link.is_some())
            + self.gallery_links.len()
    }
}

/// Builds payloads for one tracked profile
#[derive(Debug, Clone)]
pub struct PostFormatter {
    profile: String,
    max_media_refs: usize,
    max_caption_chars: usize,
    max_content_chars: usize,
}

impl PostFormatter {
    /// Create a formatter
    ///
    /// `max_media_refs` of 0 is treated as 1.
    pub fn new(profile: impl Into<String>, max_media_refs: usize) -> Self {
        Self {
            profile: profile.into(),
            max_media_refs: max_media_refs.max(1),
            max_caption_chars: DEFAULT_MAX_CAPTION_CHARS,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    /// Override the caption limit
    pub fn with_max_caption_chars(mut self, max: usize) -> Self {
        self.max_caption_chars = max;
        self
    }

    /// Override the content limit
    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    /// Convert an item into a payload
    pub fn format(&self, item: &Item) -> FormattedPayload {
        let mut budget = self.max_media_refs;

        let image_url = take_ref(&mut budget, item.image_url.clone());
        let fallback_link = take_ref(&mut budget, item.video_url.clone());

        let mut candidates: Vec<&str> = Vec::new();
        for media in &item.gallery {
            if budget == 0 {
                break;
            }
            let url = media.url.as_str();
            let already_used = image_url.as_deref() == Some(url)
                || fallback_link.as_deref() == Some(url)
                || candidates.contains(&url);
            if already_used {
                continue;
            }
            candidates.push(url);
            budget -= 1;
        }

        let mut lines = vec![
            format!("📸 New post from **@{}**", self.profile),
            format!("Post: {}", item.permalink),
        ];
        if let Some(video) = &fallback_link {
            lines.push(format!("Video: {}", video));
        }

        // Running length of `lines.join("\n")`
        let mut used = lines.iter().map(|l| l.chars().count()).sum::<usize>() + lines.len() - 1;
        let mut gallery_links = Vec::new();
        for url in candidates {
            let line = format!("{}. {}", gallery_links.len() + 1, url);
            let mut cost = line.chars().count() + 1;
            if gallery_links.is_empty() {
                cost += MEDIA_LINKS_HEADER.chars().count() + 1;
            }
            if used + cost > self.max_content_chars {
                break;
            }
            if gallery_links.is_empty() {
                lines.push(MEDIA_LINKS_HEADER.to_string());
            }
            lines.push(line);
            gallery_links.push(url.to_string());
            used += cost;
        }

        let content = truncate_chars(&lines.join("\n"), self.max_content_chars);

        FormattedPayload {
            item_key: item.key.clone(),
            title: format!("New post from @{}", self.profile),
            url: item.permalink.clone(),
            content,
            description: item
                .caption
                .as_deref()
                .map(|caption| truncate_chars(caption, self.max_caption_chars)),
            image_url,
            fallback_link,
            gallery_links,
            timestamp: item.posted_at,
            footer: format!("Post {}", item.key),
            suppress_mentions: true,
        }
    }
}

const MEDIA_LINKS_HEADER: &str = "Media links:";

fn take_ref(budget: &mut usize, url: Option<String>) -> Option<String> {
    let url = url?;
    if *budget == 0 {
        return None;
    }
    *budget -= 1;
    Some(url)
}

/// Truncate on a char boundary, marking the cut with "..."
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

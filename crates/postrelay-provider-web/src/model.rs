//! Wire types for the `web_profile_info` response
//!
//! Only the fields the relay reads are modeled. Everything is optional or
//! defaulted because the endpoint drops fields without notice.

use chrono::DateTime;
use postrelay_core::traits::{Item, MediaKind, MediaRef};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    #[serde(default)]
    pub data: Option<ProfileData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileData {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub edge_owner_to_timeline_media: Option<Edges<MediaNode>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edges<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaNode {
    #[serde(default)]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub taken_at_timestamp: Option<i64>,
    #[serde(default)]
    pub edge_media_to_caption: Option<Edges<CaptionNode>>,
    #[serde(default)]
    pub edge_sidecar_to_children: Option<Edges<ChildNode>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CaptionNode {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChildNode {
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_url: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl MediaNode {
    /// Convert to an `Item`; `None` when the node has neither shortcode nor id
    pub fn into_item(self) -> Option<Item> {
        let shortcode = non_blank(&self.shortcode);
        let key = shortcode.clone().or_else(|| non_blank(&self.id))?;
        let permalink = match &shortcode {
            Some(sc) => format!("https://www.instagram.com/p/{}/", sc),
            None => format!("https://www.instagram.com/p/{}/", key),
        };

        let caption = self
            .edge_media_to_caption
            .as_ref()
            .and_then(|c| c.edges.first())
            .and_then(|edge| edge.node.text.clone());

        let gallery: Vec<MediaRef> = self
            .edge_sidecar_to_children
            .map(|children| children.edges)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|edge| {
                let child = edge.node;
                match (child.is_video, non_blank(&child.video_url), non_blank(&child.display_url)) {
                    (true, Some(video), _) => Some(MediaRef::video(video)),
                    (_, _, Some(image)) => Some(MediaRef::image(image)),
                    _ => None,
                }
            })
            .collect();

        let mut item = Item::new(key, permalink)
            .with_caption(caption)
            .with_posted_at(self.taken_at_timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0)));

        if let Some(image) = non_blank(&self.display_url) {
            item = item.with_image(image);
        }
        match (self.is_video, non_blank(&self.video_url)) {
            (_, Some(video)) => item = item.with_video(video),
            (true, None) => item = item.with_media_kind(MediaKind::Video),
            (false, None) => {}
        }

        Some(item.with_gallery(gallery))
    }
}

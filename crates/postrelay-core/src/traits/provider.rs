// # Provider Client Trait
//
// Defines the interface for fetching the newest posts of a profile from one
// upstream data source.
//
// ## Implementations
//
// - Apify scraper actor: `postrelay-provider-apify` crate
// - Public web profile endpoint: `postrelay-provider-web` crate
//
// ## Usage
//
// ```rust,ignore
// use postrelay_core::ProviderClient;
// use std::time::Duration;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* ProviderClient implementation */;
//
//     // Newest first
//     let items = provider.fetch_latest("somehandle", 1, Duration::from_secs(90)).await?;
//     println!("newest: {}", items[0].key);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What kind of media a post carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    Unknown,
}

/// One additional media reference (a slide of a multi-media post)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Remote URL of the media
    pub url: String,
    /// Whether the URL points at a video
    pub is_video: bool,
}

impl MediaRef {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_video: false,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_video: true,
        }
    }
}

/// A single post candidate, normalized from a provider's raw data
///
/// `key` is the only identity field; `fetched_at` is diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable unique identifier (platform short-code or id), opaque
    pub key: String,
    /// Caption text; `None` when the post has none
    pub caption: Option<String>,
    /// Media kind of the post
    pub media_kind: MediaKind,
    /// Preview image, when one is available
    pub image_url: Option<String>,
    /// Playable video link, when one is available
    pub video_url: Option<String>,
    /// Canonical URL back to the post
    pub permalink: String,
    /// Further media of a multi-media post, in display order
    #[serde(default)]
    pub gallery: Vec<MediaRef>,
    /// When the post was published, if the provider exposes it
    pub posted_at: Option<DateTime<Utc>>,
    /// When this item was fetched
    pub fetched_at: DateTime<Utc>,
}

impl Item {
    /// Create an item with only the identity and link set
    ///
    /// Providers fill in the optional fields with the `with_*` builders.
    pub fn new(key: impl Into<String>, permalink: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption: None,
            media_kind: MediaKind::Unknown,
            image_url: None,
            video_url: None,
            permalink: permalink.into(),
            gallery: Vec::new(),
            posted_at: None,
            fetched_at: Utc::now(),
        }
    }

    /// Set the caption; blank text is treated as no caption
    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    /// Set the preview image
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        if self.media_kind == MediaKind::Unknown {
            self.media_kind = MediaKind::Image;
        }
        self
    }

    /// Set the video link
    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self.media_kind = MediaKind::Video;
        self
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }

    pub fn with_gallery(mut self, gallery: Vec<MediaRef>) -> Self {
        self.gallery = gallery;
        self
    }

    pub fn with_posted_at(mut self, posted_at: Option<DateTime<Utc>>) -> Self {
        self.posted_at = posted_at;
        self
    }
}

/// Trait for upstream provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - One outbound read-only request per call.
/// - Returns items newest first. An empty vector is allowed; the coordinator
///   treats it as a failure and moves on.
/// - Must honor `timeout`. The coordinator also enforces it, so a provider that
///   overruns is reported as `Error::ProviderTimeout`.
/// - No retries, no state access, no decisions about what is new.
/// - Missing optional raw fields degrade to `None`, never to placeholder text.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetch the newest posts of a profile
    ///
    /// # Parameters
    ///
    /// - `profile`: The profile handle (without `@`)
    /// - `limit`: Maximum number of items to return
    /// - `timeout`: Deadline for the upstream request
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Item>)`: Candidates, newest first
    /// - `Err(Error)`: `ProviderTimeout` or `ProviderUpstream`
    async fn fetch_latest(
        &self,
        profile: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<Item>, crate::Error>;

    /// Get the provider name (for logging and failure reports)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing providers from configuration
pub trait ProviderClientFactory: Send + Sync {
    /// Create a ProviderClient instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed ProviderClient trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn ProviderClient>, crate::Error>;
}

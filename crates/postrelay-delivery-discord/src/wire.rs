//! Discord webhook wire format

use chrono::{DateTime, SecondsFormat, Utc};
use postrelay_core::FormattedPayload;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait used when a 429 carries no usable hint
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Longest wait honored from a hint
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
pub(crate) struct WebhookMessage {
    pub content: String,
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
pub(crate) struct Embed {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedFooter {
    pub text: String,
}

/// `parse: []` disables @everyone, @here, role and user mentions
#[derive(Debug, Serialize)]
pub(crate) struct AllowedMentions {
    pub parse: Vec<String>,
}

impl From<&FormattedPayload> for WebhookMessage {
    fn from(payload: &FormattedPayload) -> Self {
        Self {
            content: payload.content.clone(),
            embeds: vec![Embed {
                title: payload.title.clone(),
                url: payload.url.clone(),
                description: payload.description.clone(),
                image: payload.image_url.clone().map(|url| EmbedImage { url }),
                timestamp: payload.timestamp.map(rfc3339),
                footer: EmbedFooter {
                    text: payload.footer.clone(),
                },
            }],
            allowed_mentions: AllowedMentions { parse: Vec::new() },
        }
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

/// Wait hint for a 429: header, then JSON body, then the default; capped
///
/// Each source is used only when it holds a finite, non-negative number of
/// seconds.
pub(crate) fn retry_after(header: Option<&str>, body: &str) -> Duration {
    let usable = |secs: &f64| secs.is_finite() && *secs >= 0.0;

    let from_header = header
        .and_then(|h| h.trim().parse::<f64>().ok())
        .filter(usable);
    let from_body = || {
        serde_json::from_str::<RateLimitBody>(body)
            .ok()
            .and_then(|b| b.retry_after)
            .filter(usable)
    };

    from_header
        .or_else(from_body)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER.as_secs_f64())))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use postrelay_core::PostFormatter;
    use postrelay_core::traits::Item;

    #[test]
    fn message_carries_embed_and_blocks_mentions() {
        let item = Item::new("abc123", "https://www.instagram.com/p/abc123/")
            .with_caption(Some("hello @everyone".to_string()))
            .with_image("https://cdn.example.com/i.jpg")
            .with_posted_at(Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let payload = PostFormatter::new("somehandle", 4).format(&item);

        let json = serde_json::to_value(WebhookMessage::from(&payload)).unwrap();

        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!([]));
        let embed = &json["embeds"][0];
        assert_eq!(embed["title"], "New post from @somehandle");
        assert_eq!(embed["url"], "https://www.instagram.com/p/abc123/");
        assert_eq!(embed["description"], "hello @everyone");
        assert_eq!(embed["image"]["url"], "https://cdn.example.com/i.jpg");
        assert_eq!(embed["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(embed["footer"]["text"], "Post abc123");
    }

    #[test]
    fn absent_fields_are_omitted() {
        let item = Item::new("abc123", "https://www.instagram.com/p/abc123/");
        let payload = PostFormatter::new("somehandle", 4).format(&item);

        let json = serde_json::to_value(WebhookMessage::from(&payload)).unwrap();
        let embed = json["embeds"][0].as_object().unwrap();

        assert!(!embed.contains_key("description"));
        assert!(!embed.contains_key("image"));
        assert!(!embed.contains_key("timestamp"));
    }

    #[test]
    fn retry_after_prefers_header() {
        assert_eq!(retry_after(Some("1.5"), r#"{"retry_after": 9}"#), Duration::from_millis(1500));
    }

    #[test]
    fn retry_after_falls_back_to_body_then_default() {
        assert_eq!(retry_after(None, r#"{"retry_after": 0.25}"#), Duration::from_millis(250));
        assert_eq!(retry_after(Some("soon"), "not json"), DEFAULT_RETRY_AFTER);
        assert_eq!(retry_after(None, ""), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn retry_after_is_capped() {
        assert_eq!(retry_after(Some("3600"), ""), MAX_RETRY_AFTER);
        assert_eq!(retry_after(Some("-1"), ""), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn retry_after_huge_values_are_capped_not_fatal() {
        assert_eq!(retry_after(Some("1e30"), ""), MAX_RETRY_AFTER);
        assert_eq!(retry_after(None, r#"{"retry_after": 1e300}"#), MAX_RETRY_AFTER);
    }

    #[test]
    fn unusable_header_falls_through_to_body() {
        assert_eq!(retry_after(Some("-1"), r#"{"retry_after": 0.5}"#), Duration::from_millis(500));
        assert_eq!(retry_after(Some("NaN"), r#"{"retry_after": 3}"#), Duration::from_secs(3));
        assert_eq!(retry_after(Some("inf"), r#"{"retry_after": -2}"#), DEFAULT_RETRY_AFTER);
    }
}

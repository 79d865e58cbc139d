// # Apify Provider
//
// ProviderClient backed by an Apify Instagram scraper actor.
//
// ## Behavior
//
// - One synchronous actor run per fetch
//   (`POST /acts/{actor}/run-sync-get-dataset-items`), bounded by the caller's
//   timeout. No polling loop, no retries.
// - Dataset items are normalized defensively (see `normalize`); items without
//   a usable key are dropped.
// - A missing API token is reported as a provider failure without calling out,
//   so the coordinator can fall back to the next provider.
//
// ## Security Requirements
//
// - The API token NEVER appears in logs or Debug output
// - The token travels in the Authorization header, never in the URL
//
// ## API Reference
//
// - Apify API v2: https://docs.apify.com/api/v2
// - Run actor synchronously and get dataset items:
//   POST `/acts/:actorId/run-sync-get-dataset-items`

mod normalize;

use async_trait::async_trait;
use postrelay_core::config::ProviderConfig;
use postrelay_core::traits::{Item, ProviderClient, ProviderClientFactory};
use postrelay_core::{Error, Result};
use serde_json::{Value, json};
use std::time::Duration;

/// Apify API base URL
pub const APIFY_API_BASE: &str = "https://api.apify.com/v2";

/// Actor used when none is configured
pub const DEFAULT_ACTOR: &str = "apidojo~instagram-scraper";

const PROVIDER_NAME: &str = "apify";

/// Apify scraper provider
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct ApifyProvider {
    /// Apify API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Actor id or `user~name`
    actor: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for ApifyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApifyProvider")
            .field("api_token", &"<REDACTED>")
            .field("actor", &self.actor)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApifyProvider {
    /// Create a new Apify provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Apify API token; may be empty, in which case every fetch
    ///   fails fast with "missing API token"
    /// - `actor`: Actor to run; defaults to [`DEFAULT_ACTOR`]
    pub fn new(api_token: impl Into<String>, actor: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token: api_token.into(),
            actor: actor.unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            base_url: APIFY_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Actor this provider runs
    pub fn actor(&self) -> &str {
        &self.actor
    }

    fn run_url(&self) -> String {
        format!("{}/acts/{}/run-sync-get-dataset-items", self.base_url, self.actor)
    }
}

#[async_trait]
impl ProviderClient for ApifyProvider {
    /// Run the actor and normalize its dataset
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /acts/:actor/run-sync-get-dataset-items?timeout=<secs>
    /// Authorization: Bearer <token>
    ///
    /// { "startUrls": ["https://www.instagram.com/<profile>/"], "maxItems": <limit> }
    /// ```
    async fn fetch_latest(&self, profile: &str, limit: usize, timeout: Duration) -> Result<Vec<Item>> {
        if self.api_token.trim().is_empty() {
            return Err(Error::upstream(PROVIDER_NAME, "missing API token"));
        }

        let profile_url = format!("https://www.instagram.com/{}/", profile);
        tracing::debug!("Running actor {} for {} (maxItems={})", self.actor, profile_url, limit);

        let response = self
            .client
            .post(self.run_url())
            .bearer_auth(&self.api_token)
            .query(&[("timeout", timeout.as_secs().max(1))])
            .timeout(timeout)
            .json(&json!({
                "startUrls": [profile_url],
                "maxItems": limit,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(PROVIDER_NAME, timeout)
                } else {
                    Error::upstream(PROVIDER_NAME, format!("HTTP request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();

            return Err(match status.as_u16() {
                401 | 403 => Error::upstream(
                    PROVIDER_NAME,
                    format!("Authentication failed: invalid API token or insufficient permissions (status {})", status),
                ),
                402 => Error::upstream(PROVIDER_NAME, "Account usage limit reached (status 402)"),
                404 => Error::upstream(PROVIDER_NAME, format!("Actor not found: {}", self.actor)),
                408 => Error::timeout(PROVIDER_NAME, timeout),
                429 => Error::upstream(PROVIDER_NAME, format!("Rate limit exceeded (status {})", status)),
                500..=599 => Error::upstream(
                    PROVIDER_NAME,
                    format!("Apify server error (transient): {} - {}", status, excerpt),
                ),
                _ => Error::upstream(PROVIDER_NAME, format!("Actor run failed: {} - {}", status, excerpt)),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upstream(PROVIDER_NAME, format!("Failed to parse response: {}", e)))?;

        let raw_items = body
            .as_array()
            .ok_or_else(|| Error::upstream(PROVIDER_NAME, "Invalid response format: dataset is not an array"))?;

        let items: Vec<Item> = raw_items
            .iter()
            .filter_map(|raw| normalize::normalize_item(raw, profile))
            .take(limit)
            .collect();

        let dropped = raw_items.len().saturating_sub(items.len());
        if dropped > 0 {
            tracing::debug!("Dropped {} dataset item(s) without a key or beyond the limit", dropped);
        }

        Ok(items)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Apify providers
pub struct ApifyFactory;

impl ProviderClientFactory for ApifyFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ProviderClient>> {
        match config {
            ProviderConfig::Apify { api_token, actor } => {
                if api_token.trim().is_empty() {
                    tracing::warn!("Apify provider has no API token; it will be skipped at fetch time");
                }
                Ok(Box::new(ApifyProvider::new(api_token.clone(), actor.clone())?))
            }
            _ => Err(Error::config("Invalid config for Apify provider")),
        }
    }
}

/// Register the Apify provider with a registry
///
/// # Example
///
/// ```rust
/// use postrelay_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// postrelay_provider_apify::register(&registry);
/// assert!(registry.has_provider("apify"));
/// ```
pub fn register(registry: &postrelay_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(ApifyFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let config = ProviderConfig::Apify {
            api_token: "test_token".to_string(),
            actor: Some("someone~scraper".to_string()),
        };

        let provider = ApifyFactory.create(&config).unwrap();
        assert_eq!(provider.provider_name(), "apify");
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Web { session_id: None };
        assert!(ApifyFactory.create(&config).is_err());
    }

    #[test]
    fn default_actor_is_used() {
        let provider = ApifyProvider::new("t", None).unwrap();
        assert_eq!(provider.actor(), DEFAULT_ACTOR);
        assert_eq!(
            provider.run_url(),
            "https://api.apify.com/v2/acts/apidojo~instagram-scraper/run-sync-get-dataset-items"
        );
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = ApifyProvider::new("secret_token_12345", None).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("ApifyProvider"));
    }

    #[tokio::test]
    async fn empty_token_fails_without_calling_out() {
        let provider = ApifyProvider::new("", None)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = provider
            .fetch_latest("handle", 1, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing API token"), "{err}");
    }
}

// # Web Profile Provider
//
// Best-effort ProviderClient that reads Instagram's public `web_profile_info`
// endpoint, the same one the instagram.com web app uses.
//
// ## Behavior
//
// - One GET per fetch, bounded by the caller's timeout
// - Anonymous by default; an optional `sessionid` cookie raises the rate limit
//   and unlocks profiles that require login
// - 401/403/429 and 5xx responses are upstream failures, so the coordinator
//   moves on to the next provider
//
// ## Security Requirements
//
// - The session cookie NEVER appears in logs or Debug output

mod model;

use async_trait::async_trait;
use postrelay_core::config::ProviderConfig;
use postrelay_core::traits::{Item, ProviderClient, ProviderClientFactory};
use postrelay_core::{Error, Result};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use model::ProfileResponse;

/// Public profile endpoint
pub const WEB_PROFILE_ENDPOINT: &str = "https://i.instagram.com/api/v1/users/web_profile_info/";

/// App id the instagram.com web client sends
const WEB_APP_ID: &str = "936619743392459";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const PROVIDER_NAME: &str = "web";

/// Public web profile provider
pub struct WebProfileProvider {
    /// Optional logged-in session
    /// ⚠️ NEVER log this value
    session_id: Option<String>,

    /// Endpoint URL (overridable for tests)
    endpoint: String,

    client: reqwest::Client,
}

impl std::fmt::Debug for WebProfileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebProfileProvider")
            .field("session_id", &self.session_id.as_ref().map(|_| "<REDACTED>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl WebProfileProvider {
    /// Create a new provider, optionally with a `sessionid` cookie value
    pub fn new(session_id: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-ig-app-id", HeaderValue::from_static(WEB_APP_ID));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            session_id: session_id.filter(|s| !s.trim().is_empty()),
            endpoint: WEB_PROFILE_ENDPOINT.to_string(),
            client,
        })
    }

    /// Point the provider at a different endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ProviderClient for WebProfileProvider {
    async fn fetch_latest(&self, profile: &str, limit: usize, timeout: Duration) -> Result<Vec<Item>> {
        tracing::debug!(
            "Fetching web profile for {} (session={})",
            profile,
            self.session_id.is_some()
        );

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("username", profile)])
            .timeout(timeout);

        if let Some(session_id) = &self.session_id {
            let cookie = HeaderValue::from_str(&format!("sessionid={}", session_id))
                .map_err(|_| Error::config("Session id contains invalid header characters"))?;
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(PROVIDER_NAME, timeout)
            } else {
                Error::upstream(PROVIDER_NAME, format!("HTTP request failed: {}", e.without_url()))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => Error::upstream(PROVIDER_NAME, format!("Login required (status {})", status)),
                404 => Error::upstream(PROVIDER_NAME, format!("Profile not found: {}", profile)),
                429 => Error::upstream(PROVIDER_NAME, format!("Rate limit exceeded (status {})", status)),
                500..=599 => Error::upstream(PROVIDER_NAME, format!("Server error (transient): {}", status)),
                _ => Error::upstream(PROVIDER_NAME, format!("Unexpected status {}", status)),
            });
        }

        let body: ProfileResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(PROVIDER_NAME, format!("Failed to parse response: {}", e)))?;

        let user = body
            .data
            .and_then(|data| data.user)
            .ok_or_else(|| Error::upstream(PROVIDER_NAME, format!("Profile not found: {}", profile)))?;

        let is_private = user.is_private;
        let timeline = user.edge_owner_to_timeline_media.map(|m| m.edges).unwrap_or_default();
        if timeline.is_empty() && is_private {
            return Err(Error::upstream(PROVIDER_NAME, format!("Profile {} is private", profile)));
        }

        Ok(timeline
            .into_iter()
            .filter_map(|edge| edge.node.into_item())
            .take(limit)
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating web profile providers
pub struct WebProfileFactory;

impl ProviderClientFactory for WebProfileFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ProviderClient>> {
        match config {
            ProviderConfig::Web { session_id } => Ok(Box::new(WebProfileProvider::new(session_id.clone())?)),
            _ => Err(Error::config("Invalid config for web profile provider")),
        }
    }
}

/// Register the web profile provider with a registry
pub fn register(registry: &postrelay_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(WebProfileFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let provider = WebProfileFactory
            .create(&ProviderConfig::Web { session_id: None })
            .unwrap();
        assert_eq!(provider.provider_name(), "web");
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Apify {
            api_token: "t".to_string(),
            actor: None,
        };
        assert!(WebProfileFactory.create(&config).is_err());
    }

    #[test]
    fn session_not_exposed_in_debug() {
        let provider = WebProfileProvider::new(Some("very-secret-session".to_string())).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("very-secret-session"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn blank_session_is_ignored() {
        let provider = WebProfileProvider::new(Some("  ".to_string())).unwrap();
        assert!(provider.session_id.is_none());
    }
}

// # Discord Webhook Transport
//
// Single-shot DeliveryTransport for Discord webhooks.
//
// ## Response Classification
//
// | Response               | Result                                  |
// |------------------------|-----------------------------------------|
// | 2xx                    | `Delivered`                             |
// | 429                    | `RateLimited` with the parsed wait hint |
// | 5xx, network, timeout  | `Transient`                             |
// | any other status       | `Rejected`                              |
//
// Retry and backoff are owned by `postrelay_core::DeliveryClient`.
//
// ## Security Requirements
//
// - The webhook URL embeds its token; it NEVER appears in logs, errors or
//   Debug output

mod wire;

pub use wire::{DEFAULT_RETRY_AFTER, MAX_RETRY_AFTER};

use async_trait::async_trait;
use postrelay_core::config::DeliveryConfig;
use postrelay_core::traits::{DeliveryResponse, DeliveryTransport, DeliveryTransportFactory};
use postrelay_core::{Error, FormattedPayload, Result};
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

use wire::WebhookMessage;

/// Default per-request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Discord webhook transport
pub struct DiscordTransport {
    /// Webhook URL
    /// ⚠️ NEVER log this value
    webhook_url: String,

    client: reqwest::Client,

    timeout: Duration,
}

impl std::fmt::Debug for DiscordTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordTransport")
            .field("webhook_url", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DiscordTransport {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() {
            return Err(Error::config("Discord webhook URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            client,
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DeliveryTransport for DiscordTransport {
    async fn send(&self, payload: &FormattedPayload) -> Result<DeliveryResponse> {
        let message = WebhookMessage::from(payload);

        let response = match self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&message)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out after {:?}", self.timeout)
                } else {
                    format!("request failed: {}", e.without_url())
                };
                return Ok(DeliveryResponse::Transient { status: None, message });
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(DeliveryResponse::Delivered);
        }

        let header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(200).collect();

        Ok(match status.as_u16() {
            429 => {
                let retry_after = wire::retry_after(header.as_deref(), &body);
                tracing::warn!("Discord rate limited, retry after {:?}", retry_after);
                DeliveryResponse::RateLimited { retry_after }
            }
            code @ 500..=599 => DeliveryResponse::Transient {
                status: Some(code),
                message: excerpt,
            },
            code => DeliveryResponse::Rejected {
                status: code,
                message: excerpt,
            },
        })
    }

    fn transport_name(&self) -> &'static str {
        "discord"
    }
}

/// Factory for creating Discord transports
pub struct DiscordFactory;

impl DeliveryTransportFactory for DiscordFactory {
    fn create(&self, config: &DeliveryConfig) -> Result<Box<dyn DeliveryTransport>> {
        match config {
            DeliveryConfig::Discord { webhook_url } => Ok(Box::new(DiscordTransport::new(webhook_url.clone())?)),
            _ => Err(Error::config("Invalid config for Discord transport")),
        }
    }
}

/// Register the Discord transport with a registry
pub fn register(registry: &postrelay_core::ProviderRegistry) {
    registry.register_transport("discord", Box::new(DiscordFactory));
}

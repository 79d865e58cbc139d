//! Configuration types for the relay
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them (environment, files, secrets) is the caller's job; the core only
//! consumes and validates them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on items requested per fetch
pub const MAX_FETCH_LIMIT: usize = 50;

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Profile handle to track (without `@`)
    pub profile: String,

    /// Providers in priority order
    pub providers: Vec<ProviderConfig>,

    /// Dedupe store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Webhook delivery; may be omitted for dry runs
    #[serde(default)]
    pub delivery: Option<DeliveryConfig>,

    /// Per-run behavior
    #[serde(default)]
    pub run: RunConfig,
}

impl RelayConfig {
    /// Create a new configuration with defaults for the given profile
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            providers: Vec::new(),
            state_store: StateStoreConfig::default(),
            delivery: None,
            run: RunConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let profile = self.profile.trim();
        if profile.is_empty() {
            return Err(crate::Error::config("Profile handle cannot be empty"));
        }
        if profile.starts_with('@') {
            return Err(crate::Error::config(
                "Profile handle must not include the leading '@'",
            ));
        }

        if self.providers.is_empty() {
            return Err(crate::Error::config("No providers configured"));
        }
        for provider in &self.providers {
            provider.validate()?;
        }

        match &self.delivery {
            Some(delivery) => delivery.validate()?,
            None if !self.run.dry_run => {
                return Err(crate::Error::config(
                    "Delivery configuration is required unless dry_run is enabled",
                ));
            }
            None => {}
        }

        self.run.validate()
    }
}

/// Upstream provider configuration
///
/// `Debug` redacts credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Apify scraper actor
    Apify {
        /// Apify API token; an empty token makes the provider report a
        /// failure instead of calling upstream
        #[serde(default)]
        api_token: String,
        /// Actor to run (e.g. "apify~instagram-scraper")
        #[serde(default)]
        actor: Option<String>,
    },

    /// Public web profile endpoint
    Web {
        /// Optional logged-in session cookie
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Apify { api_token, actor } => f
                .debug_struct("Apify")
                .field("api_token", &redacted(!api_token.is_empty()))
                .field("actor", actor)
                .finish(),
            ProviderConfig::Web { session_id } => f
                .debug_struct("Web")
                .field("session_id", &session_id.as_ref().map(|_| "<REDACTED>"))
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Apify { actor, .. } => {
                if actor.as_deref().is_some_and(|a| a.trim().is_empty()) {
                    return Err(crate::Error::config("Apify actor cannot be blank"));
                }
                Ok(())
            }
            ProviderConfig::Web { .. } => Ok(()),
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Apify { .. } => "apify",
            ProviderConfig::Web { .. } => "web",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Dedupe store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Webhook delivery configuration
///
/// `Debug` redacts the webhook URL.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryConfig {
    /// Discord webhook
    Discord {
        /// Webhook URL (a credential; never logged)
        webhook_url: String,
    },

    /// Custom transport
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryConfig::Discord { .. } => f
                .debug_struct("Discord")
                .field("webhook_url", &"<REDACTED>")
                .finish(),
            DeliveryConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

impl DeliveryConfig {
    /// Validate the delivery configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DeliveryConfig::Discord { webhook_url } => {
                if webhook_url.is_empty() {
                    return Err(crate::Error::config("Discord webhook URL cannot be empty"));
                }
                if !webhook_url.starts_with("https://") && !webhook_url.starts_with("http://") {
                    return Err(crate::Error::config(
                        "Discord webhook URL must use HTTP or HTTPS",
                    ));
                }
                Ok(())
            }
            DeliveryConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom delivery factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the transport type name
    pub fn type_name(&self) -> &str {
        match self {
            DeliveryConfig::Discord { .. } => "discord",
            DeliveryConfig::Custom { factory, .. } => factory,
        }
    }
}

fn redacted(present: bool) -> &'static str {
    if present { "<REDACTED>" } else { "<EMPTY>" }
}

/// How many new items one run announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Only the newest candidate; fetches a single item
    #[default]
    Newest,
    /// Every candidate newer than the stored key, oldest first
    Backlog,
}

/// Per-run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Treat the top candidate as new regardless of stored state
    #[serde(default)]
    pub force: bool,

    /// Fetch and format, but never deliver or persist
    #[serde(default)]
    pub dry_run: bool,

    /// Report an all-providers failure as a non-fatal outcome
    #[serde(default = "default_skip_on_fetch_error")]
    pub skip_on_fetch_error: bool,

    /// Items requested per fetch in backlog mode (newest mode always uses 1)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Deadline for each provider attempt (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Maximum media references per delivered item
    #[serde(default = "default_max_media_refs")]
    pub max_media_refs: usize,

    /// Maximum delivery attempts, including the first
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// Base delay for server-error backoff (in milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Ceiling for any single retry wait (in milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Newest-only or oldest-to-newest backlog
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// Capacity of the run event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl RunConfig {
    /// Validate run settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_limit == 0 || self.fetch_limit > MAX_FETCH_LIMIT {
            return Err(crate::Error::config(format!(
                "fetch_limit must be between 1 and {}, got {}",
                MAX_FETCH_LIMIT, self.fetch_limit
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("fetch_timeout_secs must be > 0"));
        }
        if self.max_media_refs == 0 {
            return Err(crate::Error::config("max_media_refs must be > 0"));
        }
        if self.max_delivery_attempts == 0 {
            return Err(crate::Error::config("max_delivery_attempts must be > 0"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(crate::Error::config(
                "retry_base_delay_ms cannot exceed retry_max_delay_ms",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Items to request from providers for this mode
    pub fn effective_fetch_limit(&self) -> usize {
        match self.delivery_mode {
            DeliveryMode::Newest => 1,
            DeliveryMode::Backlog => self.fetch_limit,
        }
    }

    /// Per-provider deadline
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            skip_on_fetch_error: default_skip_on_fetch_error(),
            fetch_limit: default_fetch_limit(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_media_refs: default_max_media_refs(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            delivery_mode: DeliveryMode::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_skip_on_fetch_error() -> bool {
    true
}

fn default_fetch_limit() -> usize {
    3
}

fn default_fetch_timeout_secs() -> u64 {
    90
}

fn default_max_media_refs() -> usize {
    4
}

fn default_max_delivery_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1_500
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_event_channel_capacity() -> usize {
    64
}

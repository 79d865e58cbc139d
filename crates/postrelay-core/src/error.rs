//! Error types for the relay pipeline
//!
//! This module defines all error types used throughout the crate.
//!
//! Propagation rules:
//! - Per-provider failures (`ProviderTimeout`, `ProviderUpstream`) are caught by the
//!   `FetchCoordinator`; only `AllProvidersFailed` reaches the engine.
//! - `DeliveryRateLimited` is retried inside the `DeliveryClient` and only surfaces
//!   wrapped in `DeliveryExhausted`.
//! - `StateUnavailable` is always fatal.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// One provider's failure, recorded by the coordinator for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name (e.g. "apify")
    pub provider: String,
    /// Human-readable failure reason
    pub reason: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Core error type for the relay pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// A provider did not answer before its deadline
    #[error("Provider {provider} timed out after {timeout:?}")]
    ProviderTimeout {
        /// Provider name
        provider: String,
        /// The deadline that expired
        timeout: Duration,
    },

    /// A provider answered with a failure (non-2xx, bad payload, no items)
    #[error("Provider error ({provider}): {message}")]
    ProviderUpstream {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Every configured provider failed
    #[error("All providers failed: {}", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// Persisted dedupe state exists but cannot be read or parsed
    #[error("Dedupe state unavailable: {0}")]
    StateUnavailable(String),

    /// Webhook asked us to slow down
    #[error("Delivery rate limited, retry after {retry_after:?}")]
    DeliveryRateLimited {
        /// Wait hint supplied by the endpoint
        retry_after: Duration,
    },

    /// Webhook rejected the payload; retrying cannot help
    #[error("Delivery rejected (status {status}): {message}")]
    DeliveryRejected {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Retry budget spent without a successful delivery
    #[error("Delivery failed after {attempts} attempt(s): {last_error}")]
    DeliveryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl Error {
    /// Create a provider timeout error
    pub fn timeout(provider: impl Into<String>, timeout: Duration) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            timeout,
        }
    }

    /// Create a provider upstream error
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUpstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a state unavailable error
    pub fn state_unavailable(msg: impl Into<String>) -> Self {
        Self::StateUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// True for fetch-side failures the skip-on-fetch-error policy may downgrade
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::AllProvidersFailed(_) | Error::ProviderTimeout { .. } | Error::ProviderUpstream { .. }
        )
    }

    /// Per-provider failure reasons, when this is an aggregate fetch failure
    pub fn provider_failures(&self) -> &[ProviderFailure] {
        match self {
            Error::AllProvidersFailed(failures) => failures,
            _ => &[],
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

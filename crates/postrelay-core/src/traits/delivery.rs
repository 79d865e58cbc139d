// # Delivery Transport Trait
//
// Defines the interface for sending one formatted payload to a webhook.
//
// ## Implementations
//
// - Discord webhooks: `postrelay-delivery-discord` crate
//
// Transports are single-shot. Retry and backoff belong to
// [`crate::delivery::DeliveryClient`], which interprets the classified
// [`DeliveryResponse`] returned here.

use async_trait::async_trait;
use std::time::Duration;

use crate::format::FormattedPayload;

/// Classified outcome of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResponse {
    /// The endpoint accepted the payload
    Delivered,

    /// The endpoint asked us to wait before retrying
    RateLimited {
        /// Wait hint parsed from the response
        retry_after: Duration,
    },

    /// Server-side or network failure; worth retrying
    Transient {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Short description
        message: String,
    },

    /// Client-side failure (bad payload, unknown webhook); never retried
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },
}

/// Trait for webhook transport implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - Perform one HTTP request to the configured endpoint per call
/// - Serialize the payload into the endpoint's wire format
///
/// ## Forbidden Capabilities
/// - Retry or sleep (owned by `DeliveryClient`)
/// - Access the dedupe store (owned by `RelayEngine`)
/// - Log the endpoint URL (it is a credential)
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Send one payload
    ///
    /// Network-level failures should be mapped to `DeliveryResponse::Transient`
    /// rather than returned as errors; `Err` is reserved for failures that
    /// happen before anything is sent (e.g. serialization).
    async fn send(&self, payload: &FormattedPayload) -> Result<DeliveryResponse, crate::Error>;

    /// Get the transport name (for logging)
    fn transport_name(&self) -> &'static str;
}

/// Helper trait for constructing transports from configuration
pub trait DeliveryTransportFactory: Send + Sync {
    /// Create a DeliveryTransport instance from configuration
    fn create(
        &self,
        config: &crate::config::DeliveryConfig,
    ) -> Result<Box<dyn DeliveryTransport>, crate::Error>;
}

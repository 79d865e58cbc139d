//! Webhook delivery with bounded retry
//!
//! [`DeliveryClient`] wraps a single-shot [`DeliveryTransport`] in an explicit,
//! bounded loop:
//!
//! - **Rate limited**: sleep for the endpoint's wait hint, then retry. A hint
//!   longer than `max_delay` ends the call instead of stalling the run.
//! - **Transient** (5xx, network): exponential backoff, `base_delay * 2^n`,
//!   capped at `max_delay`.
//! - **Rejected** (other 4xx): returned immediately as `DeliveryRejected`.
//!
//! Attempts are sequential; there is never more than one request in flight for
//! the same payload.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::format::FormattedPayload;
use crate::traits::{DeliveryResponse, DeliveryTransport};

/// Retry settings for one delivery call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Initial delay after a transient failure
    pub base_delay: Duration,
    /// Longest single wait; also the ceiling for rate-limit hints
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Three attempts, 1.5s base, one minute ceiling
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(1_500),
        max_delay: Duration::from_secs(60),
    };

    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Build from run settings
    pub fn from_run_config(run: &RunConfig) -> Self {
        Self::new(
            run.max_delivery_attempts,
            Duration::from_millis(run.retry_base_delay_ms),
            Duration::from_millis(run.retry_max_delay_ms),
        )
    }

    /// Backoff before retry number `retry` (0-indexed)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sends payloads through a transport, retrying transient failures
pub struct DeliveryClient {
    transport: Box<dyn DeliveryTransport>,
    policy: RetryPolicy,
}

impl DeliveryClient {
    pub fn new(transport: Box<dyn DeliveryTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver one payload
    ///
    /// # Returns
    ///
    /// - `Ok(attempts)`: Delivered; number of attempts it took
    /// - `Err(Error::DeliveryRejected)`: Non-retryable client-side failure
    /// - `Err(Error::DeliveryExhausted)`: Retry budget spent
    pub async fn deliver(&self, payload: &FormattedPayload) -> Result<u32> {
        let transport = self.transport.transport_name();
        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            debug!(
                "Delivering item {} via {} (attempt {}/{})",
                payload.item_key, transport, attempt, max_attempts
            );

            let wait = match self.transport.send(payload).await? {
                DeliveryResponse::Delivered => {
                    info!(
                        "Delivered item {} via {} after {} attempt(s)",
                        payload.item_key, transport, attempt
                    );
                    return Ok(attempt);
                }
                DeliveryResponse::Rejected { status, message } => {
                    warn!("Delivery of {} rejected with status {}", payload.item_key, status);
                    return Err(Error::DeliveryRejected { status, message });
                }
                DeliveryResponse::RateLimited { retry_after } => {
                    last_error = Error::DeliveryRateLimited { retry_after }.to_string();
                    if retry_after > self.policy.max_delay {
                        warn!(
                            "Rate limit wait {:?} exceeds ceiling {:?}, giving up",
                            retry_after, self.policy.max_delay
                        );
                        return Err(Error::DeliveryExhausted {
                            attempts: attempt,
                            last_error,
                        });
                    }
                    retry_after
                }
                DeliveryResponse::Transient { status, message } => {
                    last_error = match status {
                        Some(status) => format!("status {}: {}", status, message),
                        None => message,
                    };
                    self.policy.backoff_for(attempt - 1)
                }
            };

            if attempt < max_attempts {
                warn!(
                    "Delivery attempt {}/{} failed ({}), retrying in {:?}",
                    attempt, max_attempts, last_error, wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(Error::DeliveryExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

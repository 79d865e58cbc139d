//! Provider fallback
//!
//! The [`FetchCoordinator`] tries providers in their configured order and
//! returns the first non-empty result. Later providers are never called once
//! one succeeds. Individual failures are recorded and only surface, together,
//! as `Error::AllProvidersFailed`.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, ProviderFailure, Result};
use crate::traits::{Item, ProviderClient};

/// Ordered provider fallback with a per-attempt deadline
pub struct FetchCoordinator {
    providers: Vec<Box<dyn ProviderClient>>,
}

impl FetchCoordinator {
    /// Create a coordinator; `providers` is the priority order
    pub fn new(providers: Vec<Box<dyn ProviderClient>>) -> Self {
        Self { providers }
    }

    /// Names of the providers, in priority order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    /// Fetch candidates for `profile`
    ///
    /// # Parameters
    ///
    /// - `profile`: The profile handle
    /// - `limit`: Maximum items per provider call
    /// - `timeout`: Deadline applied to each provider attempt separately
    ///
    /// # Returns
    ///
    /// - `Ok((provider_name, items))`: The first non-empty result, newest first
    /// - `Err(Error::AllProvidersFailed)`: Every provider failed or returned nothing
    pub async fn fetch(
        &self,
        profile: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<(&'static str, Vec<Item>)> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.provider_name();
            debug!("Trying provider {} (limit={}, timeout={:?})", name, limit, timeout);

            let attempt = tokio::time::timeout(timeout, provider.fetch_latest(profile, limit, timeout)).await;

            let failure = match attempt {
                Ok(Ok(items)) if !items.is_empty() => {
                    let mut items = items;
                    items.truncate(limit);
                    info!("Provider {} returned {} item(s)", name, items.len());
                    return Ok((name, items));
                }
                Ok(Ok(_)) => "returned no items".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(_) => Error::timeout(name, timeout).to_string(),
            };

            warn!("Provider {} failed: {}", name, failure);
            failures.push(ProviderFailure::new(name, failure));
        }

        Err(Error::AllProvidersFailed(failures))
    }
}

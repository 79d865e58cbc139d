//! Relay engine
//!
//! The RelayEngine performs exactly one run:
//! - Loads the dedupe state once
//! - Fetches candidates through the FetchCoordinator
//! - Decides which candidates are new
//! - Formats and delivers them (unless dry-run)
//! - Persists the delivered key after each successful delivery
//!
//! ## Run State Machine
//!
//! ```text
//! Idle ─► Fetching ─┬─► FetchFailed ──► SkippedFetchError | fatal
//!                   │
//!                   └─► Fetched ─► Comparing ─┬─► AlreadySeen
//!                                             │
//!                                             └─► New ─► Formatting ─┬─► SkippedDryRun
//!                                                                    │
//!                                                                    └─► Delivering ─┬─► DeliveryFailed (fatal)
//!                                                                                    │
//!                                                                                    └─► Persisting ─► Delivered
//! ```
//!
//! Scheduling and mutual exclusion between runs belong to the caller. The
//! engine assumes it is the only active run and takes no locks.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::{DeliveryMode, RelayConfig, RunConfig};
use crate::delivery::{DeliveryClient, RetryPolicy};
use crate::error::{Error, Result};
use crate::fetch::FetchCoordinator;
use crate::format::PostFormatter;
use crate::traits::{DedupeState, DedupeStore, DeliveryTransport, Item, ProviderClient};

/// Events emitted by the RelayEngine during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run started
    Started {
        profile: String,
        mode: DeliveryMode,
        force: bool,
        dry_run: bool,
    },

    /// A provider returned candidates
    Fetched { provider: String, count: usize },

    /// Every provider failed
    FetchFailed { reason: String },

    /// Newest candidate matches the stored key
    AlreadySeen { key: String },

    /// Candidate selected for announcement
    NewItem { key: String },

    /// Dry run: the payload was built but not sent
    DryRunSkipped { key: String },

    /// Delivery confirmed by the endpoint
    Delivered { key: String, attempts: u32 },

    /// Delivery rejected or retries exhausted
    DeliveryFailed { key: String, error: String },

    /// Key written to the dedupe store
    Persisted { key: String },

    /// Run finished with an outcome label
    Finished { outcome: String },
}

/// Terminal result of a successful (non-fatal) run
///
/// Fatal terminal states are returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RunOutcome {
    /// One or more items delivered and persisted, oldest first
    Delivered { keys: Vec<String> },

    /// Nothing new since the last run
    AlreadySeen { key: String },

    /// Items that would have been delivered
    SkippedDryRun { keys: Vec<String> },

    /// Every provider failed and the skip policy downgraded it
    SkippedFetchError { reason: String },
}

impl RunOutcome {
    /// Short stable label for logs and exit-code mapping
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Delivered { .. } => "delivered",
            RunOutcome::AlreadySeen { .. } => "already-seen",
            RunOutcome::SkippedDryRun { .. } => "skipped-dry-run",
            RunOutcome::SkippedFetchError { .. } => "skipped-fetch-error",
        }
    }
}

/// Core relay engine
///
/// The engine owns the whole pipeline for one profile. Build it once per
/// process and call [`RelayEngine::run()`] once per scheduled invocation.
///
/// ## Event Channel
///
/// Events go out on a bounded channel with `try_send`. A slow or absent
/// consumer costs dropped events, never a stalled run.
pub struct RelayEngine {
    /// Profile handle
    profile: String,

    /// Provider fallback
    coordinator: FetchCoordinator,

    /// Persisted "last announced" record
    store: Box<dyn DedupeStore>,

    /// Webhook delivery; `None` only in dry-run
    delivery: Option<DeliveryClient>,

    /// Item to payload conversion
    formatter: PostFormatter,

    /// Per-run behavior
    run: RunConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RunEvent>,
}

impl RelayEngine {
    /// Create a new relay engine
    ///
    /// # Parameters
    ///
    /// - `providers`: Provider clients in priority order
    /// - `store`: Dedupe store implementation
    /// - `transport`: Webhook transport; may be `None` only when `dry_run` is set
    /// - `config`: Relay configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields run events
    pub fn new(
        providers: Vec<Box<dyn ProviderClient>>,
        store: Box<dyn DedupeStore>,
        transport: Option<Box<dyn DeliveryTransport>>,
        config: RelayConfig,
    ) -> Result<(Self, mpsc::Receiver<RunEvent>)> {
        config.validate()?;

        if providers.is_empty() {
            return Err(Error::config("At least one provider client is required"));
        }
        if transport.is_none() && !config.run.dry_run {
            return Err(Error::config(
                "A delivery transport is required unless dry_run is enabled",
            ));
        }

        let (tx, rx) = mpsc::channel(config.run.event_channel_capacity);

        let policy = RetryPolicy::from_run_config(&config.run);
        let engine = Self {
            formatter: PostFormatter::new(config.profile.clone(), config.run.max_media_refs),
            profile: config.profile,
            coordinator: FetchCoordinator::new(providers),
            store,
            delivery: transport.map(|t| DeliveryClient::new(t, policy)),
            run: config.run,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Perform one run
    ///
    /// # Returns
    ///
    /// - `Ok(RunOutcome)`: Any of the non-fatal terminal states
    /// - `Err(Error::StateUnavailable)`: Dedupe state could not be read
    /// - `Err(Error::AllProvidersFailed)`: Fetch failed and the skip policy is off
    /// - `Err(Error::DeliveryRejected | Error::DeliveryExhausted)`: Delivery failed;
    ///   the item stays unpersisted and is retried by the next run
    pub async fn run(&self) -> Result<RunOutcome> {
        self.emit_event(RunEvent::Started {
            profile: self.profile.clone(),
            mode: self.run.delivery_mode,
            force: self.run.force,
            dry_run: self.run.dry_run,
        });

        let result = self.run_once().await;

        match &result {
            Ok(outcome) => {
                info!("Run finished: {}", outcome.label());
                self.emit_event(RunEvent::Finished {
                    outcome: outcome.label().to_string(),
                });
            }
            Err(e) => {
                error!("Run failed: {}", e);
                self.emit_event(RunEvent::Finished {
                    outcome: "fatal-error".to_string(),
                });
            }
        }

        result
    }

    async fn run_once(&self) -> Result<RunOutcome> {
        let state = self.store.load().await?;
        debug!("Loaded dedupe state: last_seen_key={:?}", state.last_seen_key);

        let limit = self.run.effective_fetch_limit();
        let (provider, candidates) = match self
            .coordinator
            .fetch(&self.profile, limit, self.run.fetch_timeout())
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                self.emit_event(RunEvent::FetchFailed {
                    reason: e.to_string(),
                });
                if e.is_fetch_failure() && self.run.skip_on_fetch_error {
                    warn!("Fetch failed, skipping this run: {}", e);
                    return Ok(RunOutcome::SkippedFetchError {
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        self.emit_event(RunEvent::Fetched {
            provider: provider.to_string(),
            count: candidates.len(),
        });

        let newest = candidates
            .first()
            .ok_or_else(|| Error::Other(format!("Provider {} returned no candidates", provider)))?;

        let pending = self.select_pending(&state, &candidates);
        if pending.is_empty() {
            info!("Newest post {} already announced", newest.key);
            self.emit_event(RunEvent::AlreadySeen {
                key: newest.key.clone(),
            });
            return Ok(RunOutcome::AlreadySeen {
                key: newest.key.clone(),
            });
        }

        for item in &pending {
            self.emit_event(RunEvent::NewItem {
                key: item.key.clone(),
            });
        }

        if self.run.dry_run {
            return self.report_dry_run(&pending);
        }

        self.deliver_all(&pending).await
    }

    /// Candidates to announce, oldest first
    fn select_pending<'a>(&self, state: &DedupeState, candidates: &'a [Item]) -> Vec<&'a Item> {
        let Some(newest) = candidates.first() else {
            return Vec::new();
        };

        if self.run.force {
            debug!("Force mode: treating {} as new", newest.key);
            return vec![newest];
        }

        let Some(last_seen) = state.last_seen_key.as_deref() else {
            return vec![newest];
        };

        match self.run.delivery_mode {
            DeliveryMode::Newest => {
                if newest.key == last_seen {
                    Vec::new()
                } else {
                    vec![newest]
                }
            }
            DeliveryMode::Backlog => {
                let newer = candidates
                    .iter()
                    .position(|item| item.key == last_seen)
                    .unwrap_or(candidates.len());
                candidates[..newer].iter().rev().collect()
            }
        }
    }

    fn report_dry_run(&self, pending: &[&Item]) -> Result<RunOutcome> {
        let mut keys = Vec::with_capacity(pending.len());
        for item in pending {
            let payload = self.formatter.format(item);
            info!(
                "Dry run, not delivering {}: {}",
                item.key,
                serde_json::to_string_pretty(&payload)?
            );
            self.emit_event(RunEvent::DryRunSkipped {
                key: item.key.clone(),
            });
            keys.push(item.key.clone());
        }
        Ok(RunOutcome::SkippedDryRun { keys })
    }

    async fn deliver_all(&self, pending: &[&Item]) -> Result<RunOutcome> {
        let delivery = self
            .delivery
            .as_ref()
            .ok_or_else(|| Error::config("No delivery transport configured"))?;

        let mut keys = Vec::with_capacity(pending.len());
        for item in pending {
            let payload = self.formatter.format(item);

            let attempts = match delivery.deliver(&payload).await {
                Ok(attempts) => attempts,
                Err(e) => {
                    self.emit_event(RunEvent::DeliveryFailed {
                        key: item.key.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };
            self.emit_event(RunEvent::Delivered {
                key: item.key.clone(),
                attempts,
            });

            self.store.save(&DedupeState::seen(item.key.clone())).await?;
            info!("Persisted last seen key {}", item.key);
            self.emit_event(RunEvent::Persisted {
                key: item.key.clone(),
            });

            keys.push(item.key.clone());
        }

        Ok(RunOutcome::Delivered { keys })
    }

    /// Emit a run event
    fn emit_event(&self, event: RunEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped");
            }
        }
    }
}

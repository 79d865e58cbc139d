//! Test doubles and common utilities for pipeline contract tests
//!
//! Every double is `Clone` and clones share their counters, so a test can hand
//! one copy to the engine and keep another for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use postrelay_core::config::{DeliveryConfig, ProviderConfig, RelayConfig, StateStoreConfig};
use postrelay_core::error::{Error, Result};
use postrelay_core::traits::{DedupeState, DedupeStore, DeliveryResponse, DeliveryTransport, Item, ProviderClient};
use postrelay_core::{FormattedPayload, MemoryDedupeStore, RelayEngine, RunEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Build a candidate item with a predictable permalink
pub fn item(key: &str) -> Item {
    Item::new(key, format!("https://www.instagram.com/p/{}/", key))
}

#[derive(Debug, Clone)]
enum Behavior {
    Items(Vec<Item>),
    Fail(String),
    Hang,
}

/// A ProviderClient whose answer is set by the test
#[derive(Clone)]
pub struct MockProvider {
    name: &'static str,
    behavior: Arc<Mutex<Behavior>>,
    call_count: Arc<AtomicUsize>,
    last_limit: Arc<AtomicUsize>,
}

impl MockProvider {
    fn with_behavior(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(AtomicUsize::new(0)),
            last_limit: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns `items` (newest first) on every call
    pub fn returning(name: &'static str, items: Vec<Item>) -> Self {
        Self::with_behavior(name, Behavior::Items(items))
    }

    /// Fails with an upstream error on every call
    pub fn failing(name: &'static str, message: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(message.to_string()))
    }

    /// Never answers; only the caller's deadline ends the call
    pub fn hanging(name: &'static str) -> Self {
        Self::with_behavior(name, Behavior::Hang)
    }

    /// Change what later calls return
    pub fn set_items(&self, items: Vec<Item>) {
        *self.behavior.lock().unwrap() = Behavior::Items(items);
    }

    /// Get the number of times fetch_latest() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Limit passed to the most recent call
    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn fetch_latest(&self, _profile: &str, limit: usize, _timeout: Duration) -> Result<Vec<Item>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Items(items) => Ok(items),
            Behavior::Fail(message) => Err(Error::upstream(self.name, message)),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A DeliveryTransport that replays scripted responses, then succeeds
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<DeliveryResponse>>>,
    sent: Arc<Mutex<Vec<FormattedPayload>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses returned by the next sends, in order
    pub fn scripted(responses: Vec<DeliveryResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into())),
            sent: Arc::default(),
        }
    }

    /// Get the number of times send() was called
    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Item keys of every send attempt, in order
    pub fn sent_keys(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.item_key.clone())
            .collect()
    }

    /// Payloads of every send attempt
    pub fn sent_payloads(&self) -> Vec<FormattedPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryTransport for MockTransport {
    async fn send(&self, payload: &FormattedPayload) -> Result<DeliveryResponse> {
        self.sent.lock().unwrap().push(payload.clone());
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or(DeliveryResponse::Delivered))
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

/// A DedupeStore that counts calls and can simulate a corrupt record
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: MemoryDedupeStore,
    load_count: Arc<AtomicUsize>,
    save_count: Arc<AtomicUsize>,
    corrupt: bool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already recorded `key`
    pub fn with_last_seen(key: &str) -> Self {
        Self {
            inner: MemoryDedupeStore::with_last_seen(key),
            ..Self::default()
        }
    }

    /// Store whose load always fails with StateUnavailable
    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub async fn last_seen_key(&self) -> Option<String> {
        self.inner.last_seen_key().await
    }
}

#[async_trait]
impl DedupeStore for CountingStore {
    async fn load(&self) -> Result<DedupeState> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        if self.corrupt {
            return Err(Error::state_unavailable("unexpected end of input"));
        }
        self.inner.load().await
    }

    async fn save(&self, state: &DedupeState) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        self.inner.save(state).await
    }
}

/// Helper to create a minimal RelayConfig for testing
///
/// Retry delays are a few milliseconds so retry tests stay fast.
pub fn minimal_config(profile: &str) -> RelayConfig {
    let mut config = RelayConfig::new(profile);
    config.providers = vec![ProviderConfig::Custom {
        factory: "mock".to_string(),
        config: serde_json::json!({}),
    }];
    config.state_store = StateStoreConfig::Memory;
    config.delivery = Some(DeliveryConfig::Custom {
        factory: "mock".to_string(),
        config: serde_json::json!({}),
    });
    config.run.retry_base_delay_ms = 1;
    config.run.retry_max_delay_ms = 20;
    config.run.fetch_timeout_secs = 1;
    config
}

/// Build an engine over the given doubles
pub fn build_engine(
    providers: &[MockProvider],
    store: &CountingStore,
    transport: &MockTransport,
    config: RelayConfig,
) -> (RelayEngine, mpsc::Receiver<RunEvent>) {
    let providers = providers
        .iter()
        .map(|p| Box::new(p.clone()) as Box<dyn ProviderClient>)
        .collect();

    RelayEngine::new(
        providers,
        Box::new(store.clone()),
        Some(Box::new(transport.clone())),
        config,
    )
    .expect("engine construction succeeds")
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

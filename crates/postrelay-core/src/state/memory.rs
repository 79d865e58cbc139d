// # Memory Dedupe Store
//
// In-memory implementation of DedupeStore.
//
// ## Purpose
//
// A store that does not persist across processes. Useful for tests and for
// dry runs where state must never reach disk.
//
// ## Crash Behavior
//
// - All state is lost when the process exits
// - The next run treats the newest post as new

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::dedupe_store::{DedupeState, DedupeStore, DedupeStoreFactory};

/// In-memory dedupe store
///
/// Clones share the same underlying record.
///
/// # Example
///
/// ```rust
/// use postrelay_core::state::MemoryDedupeStore;
/// use postrelay_core::traits::{DedupeState, DedupeStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDedupeStore::new();
///     store.save(&DedupeState::seen("abc123")).await?;
///
///     let state = store.load().await?;
///     assert!(state.has_seen("abc123"));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDedupeStore {
    inner: Arc<RwLock<DedupeState>>,
}

impl MemoryDedupeStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already has `key` as its last seen key
    pub fn with_last_seen(key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DedupeState::seen(key))),
        }
    }

    /// Current last seen key
    pub async fn last_seen_key(&self) -> Option<String> {
        self.inner.read().await.last_seen_key.clone()
    }
}

#[async_trait]
impl DedupeStore for MemoryDedupeStore {
    async fn load(&self) -> Result<DedupeState, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, state: &DedupeState) -> Result<(), Error> {
        *self.inner.write().await = state.clone();
        Ok(())
    }
}

/// Factory for memory stores (`StateStoreConfig::Memory`)
pub struct MemoryDedupeStoreFactory;

impl DedupeStoreFactory for MemoryDedupeStoreFactory {
    fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn DedupeStore>, Error> {
        match config {
            StateStoreConfig::Memory => Ok(Box::new(MemoryDedupeStore::new())),
            _ => Err(Error::config("Invalid config for memory state store")),
        }
    }
}

// # Dedupe Store Trait
//
// Defines the interface for the persisted "last announced" record.
//
// ## Purpose
//
// The dedupe store makes runs idempotent by tracking the key of the most
// recently delivered item. A normal run never re-delivers that key.
//
// ## Implementations
//
// - File-based: JSON (or legacy plain text) with write-then-rename
// - Memory: for tests and throwaway runs
//
// ## Usage
//
// ```rust,ignore
// use postrelay_core::{DedupeState, DedupeStore};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* DedupeStore implementation */;
//
//     let state = store.load().await?;
//     if state.last_seen_key.as_deref() != Some("abc123") {
//         // ... deliver ...
//         store.save(&DedupeState::seen("abc123")).await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted singleton record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeState {
    /// Key of the most recently announced item; `None` on first run
    pub last_seen_key: Option<String>,
    /// When the record was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl DedupeState {
    /// State recording `key` as announced now
    pub fn seen(key: impl Into<String>) -> Self {
        Self {
            last_seen_key: Some(key.into()),
            updated_at: Some(Utc::now()),
        }
    }

    /// Whether `key` equals the stored key
    pub fn has_seen(&self, key: &str) -> bool {
        self.last_seen_key.as_deref() == Some(key)
    }
}

/// Trait for dedupe store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// The store is the only component allowed to touch persisted state. It reads
/// once at run start and writes at most once per delivered item.
///
/// ## Implementation Guidelines
///
/// - **Absent is not an error**: a missing record is `DedupeState::default()`
/// - **Corrupt is an error**: unreadable or unparseable data is
///   `Error::StateUnavailable`; never guess
/// - **Atomic save**: a crash mid-write must leave the previous record intact
#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// Load the persisted state
    ///
    /// # Returns
    ///
    /// - `Ok(DedupeState)`: The stored state, or the default on first run
    /// - `Err(Error::StateUnavailable)`: The record exists but cannot be used
    async fn load(&self) -> Result<DedupeState, crate::Error>;

    /// Replace the persisted state
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Durably written
    /// - `Err(Error)`: Storage error; the previous record is still intact
    async fn save(&self, state: &DedupeState) -> Result<(), crate::Error>;
}

/// Helper trait for constructing dedupe stores from configuration
pub trait DedupeStoreFactory: Send + Sync {
    /// Create a DedupeStore instance from configuration
    fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn DedupeStore>, crate::Error>;
}

// # postrelay-core
//
// Core library for relaying the newest post of a single social profile to a
// webhook, once.
//
// ## Architecture Overview
//
// The library provides the fetch → dedupe → format → deliver pipeline:
// - **ProviderClient**: Trait for fetching candidate items from one upstream source
// - **FetchCoordinator**: Tries providers in priority order with a per-attempt deadline
// - **DedupeStore**: Trait for the persisted "last announced" record
// - **PostFormatter**: Pure conversion of an item into a delivery payload
// - **DeliveryTransport**: Trait for a single-shot send to the webhook
// - **DeliveryClient**: Bounded retry/backoff around a transport
// - **RelayEngine**: Orchestrates one run and reports its outcome
// - **ProviderRegistry**: Plugin-based registry for providers, stores and transports
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Pipeline logic is separate from upstream integrations
// 2. **Plugin-Based**: Providers are registered by name and selected by configured order
// 3. **Library-First**: The binary is a thin shell around `RelayEngine::run()`
// 4. **Idempotency**: A persisted key is never re-delivered by a normal run
// 5. **Bounded Waits**: Every network suspension point has a deadline or a retry budget

pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod format;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{DeliveryConfig, DeliveryMode, ProviderConfig, RelayConfig, RunConfig, StateStoreConfig};
pub use delivery::{DeliveryClient, RetryPolicy};
pub use engine::{RelayEngine, RunEvent, RunOutcome};
pub use error::{Error, ProviderFailure, Result};
pub use fetch::FetchCoordinator;
pub use format::{FormattedPayload, PostFormatter};
pub use registry::ProviderRegistry;
pub use state::{FileDedupeStore, MemoryDedupeStore};
pub use traits::{DedupeState, DedupeStore, DeliveryResponse, DeliveryTransport, Item, MediaKind, ProviderClient};

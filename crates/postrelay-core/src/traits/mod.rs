//! Core traits for the relay pipeline
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ProviderClient`]: Fetch candidate items from one upstream source
//! - [`DedupeStore`]: Persist the last announced item key
//! - [`DeliveryTransport`]: Send one payload to the webhook, once

pub mod dedupe_store;
pub mod delivery;
pub mod provider;

pub use dedupe_store::{DedupeState, DedupeStore, DedupeStoreFactory};
pub use delivery::{DeliveryResponse, DeliveryTransport, DeliveryTransportFactory};
pub use provider::{Item, MediaKind, MediaRef, ProviderClient, ProviderClientFactory};

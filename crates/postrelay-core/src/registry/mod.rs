//! Plugin-based registry
//!
//! Provider clients, dedupe stores and delivery transports are registered by
//! type name and built from configuration, so the runner never hard-codes an
//! if-else chain over upstream sources.
//!
//! ## Registration
//!
//! Plugin crates expose a `register` function:
//!
//! ```rust,ignore
//! use postrelay_core::registry::ProviderRegistry;
//!
//! // In postrelay-provider-web
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("web", Box::new(WebProviderFactory));
//! }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! postrelay_provider_web::register(&registry);
//!
//! // Same order as configured
//! let providers = registry.create_providers(&config.providers)?;
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::config::{DeliveryConfig, ProviderConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileDedupeStoreFactory, MemoryDedupeStoreFactory};
use crate::traits::{DedupeStore, DeliveryTransport, ProviderClient};
use crate::traits::{DedupeStoreFactory, DeliveryTransportFactory, ProviderClientFactory};

/// Registry of factories keyed by configuration type name
///
/// `Default` yields an empty registry; [`ProviderRegistry::new()`] also
/// registers the built-in `file` and `memory` dedupe stores.
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: registration takes `&self`, so a shared
/// registry can be populated by several plugin crates.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered provider client factories
    providers: RwLock<HashMap<String, Box<dyn ProviderClientFactory>>>,

    /// Registered dedupe store factories
    state_stores: RwLock<HashMap<String, Box<dyn DedupeStoreFactory>>>,

    /// Registered delivery transport factories
    transports: RwLock<HashMap<String, Box<dyn DeliveryTransportFactory>>>,
}

impl ProviderRegistry {
    /// Create a registry with the built-in dedupe stores
    pub fn new() -> Self {
        let registry = Self::default();
        registry.register_state_store("file", Box::new(FileDedupeStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryDedupeStoreFactory));
        registry
    }

    /// Register a provider client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "apify", "web")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn ProviderClientFactory>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a dedupe store factory
    pub fn register_state_store(&self, name: impl Into<String>, factory: Box<dyn DedupeStoreFactory>) {
        self.state_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a delivery transport factory
    pub fn register_transport(&self, name: impl Into<String>, factory: Box<dyn DeliveryTransportFactory>) {
        self.transports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Create one provider client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ProviderClient>)`: Created provider instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn ProviderClient>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create provider clients for every entry, preserving order
    pub fn create_providers(&self, configs: &[ProviderConfig]) -> Result<Vec<Box<dyn ProviderClient>>> {
        configs.iter().map(|config| self.create_provider(config)).collect()
    }

    /// Create a dedupe store from configuration
    pub fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn DedupeStore>> {
        let store_type = config.type_name();
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a delivery transport from configuration
    pub fn create_transport(&self, config: &DeliveryConfig) -> Result<Box<dyn DeliveryTransport>> {
        let transport_type = config.type_name();
        let transports = self.transports.read().unwrap_or_else(PoisonError::into_inner);

        let factory = transports
            .get(transport_type)
            .ok_or_else(|| Error::config(format!("Unknown delivery type: {}", transport_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered dedupe store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// List all registered transport types
    pub fn list_transports(&self) -> Vec<String> {
        let transports = self.transports.read().unwrap_or_else(PoisonError::into_inner);
        transports.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a dedupe store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }

    /// Check if a transport type is registered
    pub fn has_transport(&self, name: &str) -> bool {
        let transports = self.transports.read().unwrap_or_else(PoisonError::into_inner);
        transports.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Item;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NamedProvider(&'static str);

    #[async_trait]
    impl ProviderClient for NamedProvider {
        async fn fetch_latest(&self, _profile: &str, _limit: usize, _timeout: Duration) -> Result<Vec<Item>> {
            Ok(Vec::new())
        }

        fn provider_name(&self) -> &'static str {
            self.0
        }
    }

    struct NamedProviderFactory(&'static str);

    impl ProviderClientFactory for NamedProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn ProviderClient>> {
            Ok(Box::new(NamedProvider(self.0)))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        assert!(!registry.has_provider("web"));
        registry.register_provider("web", Box::new(NamedProviderFactory("web")));
        assert!(registry.has_provider("web"));
        assert!(registry.list_providers().contains(&"web".to_string()));
    }

    #[test]
    fn builtin_stores_are_registered() {
        let registry = ProviderRegistry::new();
        assert!(registry.has_state_store("file"));
        assert!(registry.has_state_store("memory"));
        assert!(registry.create_state_store(&StateStoreConfig::Memory).is_ok());

        assert!(ProviderRegistry::default().list_state_stores().is_empty());
    }

    #[test]
    fn providers_are_created_in_configured_order() {
        let registry = ProviderRegistry::new();
        registry.register_provider("apify", Box::new(NamedProviderFactory("apify")));
        registry.register_provider("web", Box::new(NamedProviderFactory("web")));

        let configs = vec![
            ProviderConfig::Web { session_id: None },
            ProviderConfig::Apify {
                api_token: "t".to_string(),
                actor: None,
            },
        ];
        let providers = registry.create_providers(&configs).unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.provider_name()).collect();
        assert_eq!(names, vec!["web", "apify"]);
    }

    #[test]
    fn unknown_types_are_config_errors() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create_transport(&DeliveryConfig::Discord {
                webhook_url: "https://example.com/hook".to_string(),
            })
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}

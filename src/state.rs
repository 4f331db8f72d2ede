// src/state.rs
use std::sync::Arc;

use crate::config::Settings;
use crate::services::adapters::AdapterRegistry;
use crate::services::aggregator::Aggregator;
use crate::services::cache::CacheStore;
use crate::services::resolver::AccountResolver;

/// Shared application state, injected into every handler through a warp
/// filter. Built once at startup; the adapter registry is static from
/// then on.
pub struct AppState {
    pub settings: Settings,
    pub cache: Arc<CacheStore>,
    pub registry: Arc<AdapterRegistry>,
    pub resolver: Arc<AccountResolver>,
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(settings: Settings) -> Arc<Self> {
        let cache = Arc::new(CacheStore::new(settings.ttls.clone()));
        let registry = Arc::new(AdapterRegistry::with_simulated_backends(
            &settings.resilience,
        ));
        let resolver = Arc::new(AccountResolver::new(
            Arc::clone(&cache),
            Arc::clone(&registry),
        ));
        let aggregator = Aggregator::new(Arc::clone(&resolver), settings.overall_timeout);
        Arc::new(AppState {
            settings,
            cache,
            registry,
            resolver,
            aggregator,
        })
    }
}

// src/services/resolver.rs
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::models::AccountSummary;
use crate::services::adapters::AdapterRegistry;
use crate::services::cache::CacheStore;
use crate::services::resilience::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no account found for {0}")]
    NotFound(String),
    #[error("account {0} is unavailable: {1}")]
    Unavailable(String, String),
}

/// Single-account path: cache check, backend fetch through the resilience
/// wrapper, write-back, and the stale-fallback decision. Wrapper errors
/// never leave this boundary raw.
pub struct AccountResolver {
    cache: Arc<CacheStore>,
    registry: Arc<AdapterRegistry>,
}

impl AccountResolver {
    pub fn new(cache: Arc<CacheStore>, registry: Arc<AdapterRegistry>) -> Self {
        AccountResolver { cache, registry }
    }

    /// Resolves one account id. `bypass_cache` is the caller's no-cache
    /// directive: a fresh cache hit is ignored and the backend consulted.
    pub async fn resolve(
        &self,
        account_id: &str,
        bypass_cache: bool,
    ) -> Result<AccountSummary, ResolveError> {
        let handle = match self.registry.handle_for(account_id) {
            Some(handle) => handle,
            // No backend owns this prefix, so the id can never exist.
            None => {
                debug!("no backend registered for {}", account_id);
                return Err(ResolveError::NotFound(account_id.to_string()));
            }
        };

        let cached = self.cache.get(account_id);
        if !bypass_cache {
            if let Some(entry) = &cached {
                if entry.is_fresh() {
                    debug!(
                        "cache hit for {} (age {}ms)",
                        account_id,
                        entry.age().num_milliseconds()
                    );
                    return Ok(entry.record.clone());
                }
                debug!("cache entry for {} expired, refetching", account_id);
            }
        }

        let adapter = Arc::clone(&handle.adapter);
        let fetched = handle
            .resilience
            .call(|| {
                let adapter = Arc::clone(&adapter);
                let account_id = account_id.to_string();
                async move { adapter.fetch(&account_id).await }
            })
            .await;

        match fetched {
            Ok(record) => {
                self.cache.put(record.clone());
                Ok(record)
            }
            // A definitive negative from the backend is never masked by
            // stale cache: the account was legitimately removed upstream.
            // Evict any lingering entry so a later outage cannot resurrect it.
            Err(FetchError::NotFound) => {
                info!("{} authoritatively not found", account_id);
                self.cache.invalidate(account_id);
                Err(ResolveError::NotFound(account_id.to_string()))
            }
            Err(err) => match cached {
                Some(entry) => {
                    warn!(
                        "{} backend failed ({}), serving stale entry aged {}ms",
                        account_id,
                        err,
                        entry.age().num_milliseconds()
                    );
                    let mut record = entry.record;
                    record.stale = true;
                    Ok(record)
                }
                None => {
                    warn!("{} backend failed ({}) with no cache fallback", account_id, err);
                    Err(ResolveError::Unavailable(
                        account_id.to_string(),
                        err.to_string(),
                    ))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::BackendMode;
    use crate::services::cache::TtlPolicy;
    use crate::services::resilience::ResilienceConfig;
    use std::time::Duration;

    fn fast_config() -> ResilienceConfig {
        ResilienceConfig {
            call_timeout: Duration::from_millis(100),
            max_attempts: 1,
            base_backoff: Duration::from_millis(1),
            failure_threshold: 100,
            open_for: Duration::from_millis(50),
            max_in_flight: 4,
        }
    }

    fn resolver_with(ttls: TtlPolicy) -> (AccountResolver, Arc<AdapterRegistry>) {
        let registry = Arc::new(AdapterRegistry::with_simulated_backends(&fast_config()));
        let cache = Arc::new(CacheStore::new(ttls));
        (
            AccountResolver::new(cache, Arc::clone(&registry)),
            registry,
        )
    }

    fn backend_calls(registry: &AdapterRegistry, name: &str) -> u64 {
        registry.simulator(name).unwrap().calls()
    }

    #[tokio::test]
    async fn fresh_cache_hit_makes_no_backend_call() {
        let (resolver, registry) = resolver_with(TtlPolicy::default());
        let first = resolver.resolve("bank-001", false).await.unwrap();
        let second = resolver.resolve("bank-001", false).await.unwrap();
        assert_eq!(backend_calls(&registry, "bank-service"), 1);
        assert_eq!(first.balances, second.balances);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn bypass_forces_a_backend_call_despite_fresh_cache() {
        let (resolver, registry) = resolver_with(TtlPolicy::default());
        resolver.resolve("bank-001", false).await.unwrap();
        resolver.resolve("bank-001", true).await.unwrap();
        assert_eq!(backend_calls(&registry, "bank-service"), 2);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_refetch() {
        let ttls = TtlPolicy {
            bank: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let (resolver, registry) = resolver_with(ttls);
        resolver.resolve("bank-001", false).await.unwrap();
        let second = resolver.resolve("bank-001", false).await.unwrap();
        assert_eq!(backend_calls(&registry, "bank-service"), 2);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn backend_failure_serves_stale_cache_flagged() {
        let (resolver, registry) = resolver_with(TtlPolicy::default());
        resolver.resolve("bank-001", false).await.unwrap();
        registry
            .simulator("bank-service")
            .unwrap()
            .set_mode(BackendMode::Error, None);

        let served = resolver.resolve("bank-001", true).await.unwrap();
        assert!(served.stale);
        assert_eq!(served.account_id, "bank-001");
    }

    #[tokio::test]
    async fn backend_failure_without_cache_is_unavailable() {
        let (resolver, registry) = resolver_with(TtlPolicy::default());
        registry
            .simulator("loan-service")
            .unwrap()
            .set_mode(BackendMode::Error, None);
        let err = resolver.resolve("loan-001", false).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_, _)));
    }

    #[tokio::test]
    async fn not_found_wins_over_stale_cache() {
        // Seed an (immediately expired) entry for an id the backend does
        // not recognize; the refetch's authoritative negative must win.
        let ttls = TtlPolicy {
            bank: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let registry = Arc::new(AdapterRegistry::with_simulated_backends(&fast_config()));
        let cache = Arc::new(CacheStore::new(ttls));
        let resolver = AccountResolver::new(Arc::clone(&cache), Arc::clone(&registry));

        let mut seeded = registry
            .handle_for("bank-001")
            .unwrap()
            .adapter
            .fetch("bank-001")
            .await
            .unwrap();
        seeded.account_id = "bank-999".to_string();
        cache.put(seeded);
        assert!(cache.get("bank-999").is_some());

        let err = resolver.resolve("bank-999", false).await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound("bank-999".to_string()));
    }

    #[tokio::test]
    async fn not_found_evicts_the_cache_entry_for_good() {
        // A removed account must stay gone: a later backend outage may not
        // resurrect it through the stale-fallback path.
        let ttls = TtlPolicy {
            bank: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let registry = Arc::new(AdapterRegistry::with_simulated_backends(&fast_config()));
        let cache = Arc::new(CacheStore::new(ttls));
        let resolver = AccountResolver::new(Arc::clone(&cache), Arc::clone(&registry));

        let mut seeded = registry
            .handle_for("bank-001")
            .unwrap()
            .adapter
            .fetch("bank-001")
            .await
            .unwrap();
        seeded.account_id = "bank-999".to_string();
        cache.put(seeded);

        let err = resolver.resolve("bank-999", false).await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound("bank-999".to_string()));
        assert!(cache.get("bank-999").is_none());

        registry
            .simulator("bank-service")
            .unwrap()
            .set_mode(BackendMode::Error, None);
        let err = resolver.resolve("bank-999", false).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_, _)));
    }

    #[tokio::test]
    async fn unknown_prefix_is_not_found_without_any_backend_call() {
        let (resolver, registry) = resolver_with(TtlPolicy::default());
        let err = resolver.resolve("invalid-999", false).await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound("invalid-999".to_string()));
        for name in registry.backend_names() {
            assert_eq!(backend_calls(&registry, name), 0);
        }
    }
}

// src/services/cache.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};

use crate::models::{AccountSummary, AccountType};

/// Per-account-type freshness windows. Bank and creditcard values come from
/// observed product behavior; the rest are volatility-based defaults and all
/// of them are overridable through the environment.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub bank: Duration,
    pub creditcard: Duration,
    pub loan: Duration,
    pub investment: Duration,
    pub legacy: Duration,
    pub crypto: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy {
            bank: Duration::from_secs(30),
            creditcard: Duration::from_secs(60),
            loan: Duration::from_secs(300),
            investment: Duration::from_secs(120),
            legacy: Duration::from_secs(600),
            crypto: Duration::from_secs(15),
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, account_type: AccountType) -> Duration {
        match account_type {
            AccountType::Bank => self.bank,
            AccountType::CreditCard => self.creditcard,
            AccountType::Loan => self.loan,
            AccountType::Investment => self.investment,
            AccountType::Legacy => self.legacy,
            AccountType::Crypto => self.crypto,
        }
    }
}

/// Last-known-good record plus the moment it was fetched. The store hands
/// entries back unconditionally, expired or not; freshness is the caller's
/// judgment so expired entries remain usable as a stale fallback.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: AccountSummary,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_fresh(&self) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => Utc::now() - self.fetched_at < ttl,
            // TTL too large for chrono arithmetic: effectively unbounded.
            Err(_) => true,
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}

/// Read-through cache of canonical records, keyed by account identifier.
/// Sharded map so reads and writes to different keys do not block each
/// other. Ephemeral and rebuildable from the backends; carries no
/// durability.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    ttls: TtlPolicy,
}

impl CacheStore {
    pub fn new(ttls: TtlPolicy) -> Self {
        CacheStore {
            entries: DashMap::new(),
            ttls,
        }
    }

    pub fn get(&self, account_id: &str) -> Option<CacheEntry> {
        self.entries.get(account_id).map(|entry| entry.value().clone())
    }

    /// Stores a freshly fetched record, stamping fetch time and the TTL for
    /// its account type. Last writer wins for concurrent puts to one key.
    pub fn put(&self, mut record: AccountSummary) {
        // Invariant: the cache holds validated last-known-good records only,
        // never a stale flag or a per-request trace id.
        record.stale = false;
        record.trace_id = None;
        let entry = CacheEntry {
            ttl: self.ttls.ttl_for(record.account_type),
            fetched_at: Utc::now(),
            record,
        };
        let key = entry.record.account_id.clone();
        debug!("cache put for {} (ttl {:?})", key, entry.ttl);
        self.entries.insert(key, entry);
    }

    /// Removes one key. Returns whether an entry existed.
    pub fn invalidate(&self, account_id: &str) -> bool {
        let existed = self.entries.remove(account_id).is_some();
        info!("cache invalidate for {} (existed: {})", account_id, existed);
        existed
    }

    /// Clears every entry. Fetches already in flight may legitimately
    /// repopulate keys right afterwards; that is fresh data arriving after
    /// the clear, not resurrection of cleared state.
    pub fn invalidate_all(&self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        info!("cache cleared ({} entries dropped)", dropped);
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(account_id: &str, account_type: AccountType) -> AccountSummary {
        AccountSummary {
            account_id: account_id.into(),
            account_type,
            backend_source: "test/v1".into(),
            display_name: None,
            status: None,
            owner: None,
            balances: vec![],
            metadata: Map::new(),
            last_updated: Utc::now(),
            stale: false,
            trace_id: None,
        }
    }

    #[test]
    fn put_then_get_round_trips_the_record() {
        let store = CacheStore::new(TtlPolicy::default());
        store.put(record("bank-001", AccountType::Bank));
        let entry = store.get("bank-001").expect("entry");
        assert_eq!(entry.record.account_id, "bank-001");
        assert_eq!(entry.ttl, Duration::from_secs(30));
        assert!(entry.is_fresh());
    }

    #[test]
    fn ttl_is_derived_from_account_type() {
        let store = CacheStore::new(TtlPolicy::default());
        store.put(record("crypto-001", AccountType::Crypto));
        store.put(record("legacy-001", AccountType::Legacy));
        assert_eq!(store.get("crypto-001").unwrap().ttl, Duration::from_secs(15));
        assert_eq!(store.get("legacy-001").unwrap().ttl, Duration::from_secs(600));
    }

    #[test]
    fn expired_entries_are_still_returned() {
        let ttls = TtlPolicy {
            bank: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let store = CacheStore::new(ttls);
        store.put(record("bank-001", AccountType::Bank));
        let entry = store.get("bank-001").expect("expired entry still present");
        assert!(!entry.is_fresh());
    }

    #[test]
    fn put_strips_stale_flag_and_trace_id() {
        let store = CacheStore::new(TtlPolicy::default());
        let mut rec = record("bank-002", AccountType::Bank);
        rec.stale = true;
        rec.trace_id = Some("deadbeef".into());
        store.put(rec);
        let entry = store.get("bank-002").unwrap();
        assert!(!entry.record.stale);
        assert!(entry.record.trace_id.is_none());
    }

    #[test]
    fn invalidate_removes_only_that_key() {
        let store = CacheStore::new(TtlPolicy::default());
        store.put(record("bank-001", AccountType::Bank));
        store.put(record("card-001", AccountType::CreditCard));
        assert!(store.invalidate("bank-001"));
        assert!(!store.invalidate("bank-001"));
        assert!(store.get("bank-001").is_none());
        assert!(store.get("card-001").is_some());
    }

    #[test]
    fn invalidate_all_empties_the_store() {
        let store = CacheStore::new(TtlPolicy::default());
        store.put(record("bank-001", AccountType::Bank));
        store.put(record("loan-001", AccountType::Loan));
        assert_eq!(store.invalidate_all(), 2);
        assert!(store.is_empty());
    }
}

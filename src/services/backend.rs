// src/services/backend.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::AccountType;
use crate::services::resilience::FetchError;

/// Admin-selectable behavior of a simulated backend. The resolver and the
/// resilience wrapper never special-case these: a mode change only alters
/// how the backend behaves at its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Healthy,
    Slow,
    Error,
    Flaky,
}

#[derive(Debug, Clone, Copy)]
struct SimState {
    mode: BackendMode,
    latency: Duration,
}

const DEFAULT_SLOW_LATENCY: Duration = Duration::from_millis(5_000);

/// In-process stand-in for one backend system. Produces that backend's
/// bespoke wire payload deterministically from the account id; accounts
/// with numeric suffix 1..=100 exist, anything else is an authoritative
/// not-found. Flaky mode alternates failure and success.
pub struct SimulatedBackend {
    name: String,
    account_type: AccountType,
    state: Mutex<SimState>,
    calls: AtomicU64,
    flaky_tick: AtomicU64,
}

impl SimulatedBackend {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        SimulatedBackend {
            name: name.into(),
            account_type,
            state: Mutex::new(SimState {
                mode: BackendMode::Healthy,
                latency: DEFAULT_SLOW_LATENCY,
            }),
            calls: AtomicU64::new(0),
            flaky_tick: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    /// Total wire calls received, across modes. Tests use this to prove a
    /// cache hit made no backend call.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> BackendMode {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mode
    }

    pub fn set_mode(&self, mode: BackendMode, latency_ms: Option<u64>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.mode = mode;
        if let Some(ms) = latency_ms {
            state.latency = Duration::from_millis(ms);
        }
        info!("{}: simulation mode set to {:?}", self.name, mode);
    }

    /// One wire call: honors the current simulation mode, then either
    /// reports not-found or returns the backend's native payload.
    pub async fn call(&self, account_id: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let SimState { mode, latency } = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match mode {
            BackendMode::Healthy => {}
            BackendMode::Slow => tokio::time::sleep(latency).await,
            BackendMode::Error => {
                warn!("{}: simulated fault for {}", self.name, account_id);
                return Err(FetchError::Backend(format!(
                    "{} reported an internal fault",
                    self.name
                )));
            }
            BackendMode::Flaky => {
                if self.flaky_tick.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                    warn!("{}: flaky fault for {}", self.name, account_id);
                    return Err(FetchError::Backend(format!(
                        "{} dropped the request",
                        self.name
                    )));
                }
            }
        }
        if !self.knows(account_id) {
            return Err(FetchError::NotFound);
        }
        Ok(self.payload(account_id))
    }

    fn knows(&self, account_id: &str) -> bool {
        account_id
            .rsplit('-')
            .next()
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .map_or(false, |n| (1..=100).contains(&n))
    }

    fn payload(&self, account_id: &str) -> String {
        let amount = pseudo_amount(account_id);
        let now = Utc::now();
        match self.account_type {
            AccountType::Bank => json!({
                "acct_no": account_id,
                "acct_name": "Everyday Checking",
                "acct_status": "ACTIVE",
                "holder": { "full_name": "Dana Whitfield", "cust_ref": format!("CUST-{:05}", seed(account_id) % 90_000 + 10_000) },
                "curr": "USD",
                "avail_bal": amount,
                "ledger_bal": amount + 25.0,
                "as_of": now.to_rfc3339(),
            })
            .to_string(),
            AccountType::CreditCard => json!({
                "cardAccountId": account_id,
                "productName": "Platinum Rewards Card",
                "cardState": "OPEN",
                "currencyCode": "USD",
                "currentBalance": amount / 10.0,
                "creditAvailable": 5_000.0 - amount / 10.0,
                "creditLimit": 5_000.0,
                "lastSyncedAt": now.to_rfc3339(),
            })
            .to_string(),
            AccountType::Loan => json!({
                "loan_ref": account_id,
                "loan_product": "Fixed Rate Auto Loan",
                "loan_status": "CURRENT",
                "ccy": "USD",
                "outstanding_principal": amount * 10.0,
                "borrower": { "name": "Priya Raman", "customer_no": format!("LN-{:06}", seed(account_id) % 900_000 + 100_000) },
                "next_payment_due": (now + chrono::Duration::days(14)).format("%Y-%m-%d").to_string(),
                "as_of_ts": now.to_rfc3339(),
            })
            .to_string(),
            AccountType::Investment => json!({
                "portfolioId": account_id,
                "portfolioName": "Balanced Growth Portfolio",
                "state": "active",
                "baseCurrency": "USD",
                "cashBalance": amount / 4.0,
                "marketValue": amount * 6.0,
                "valuedAt": now.to_rfc3339(),
            })
            .to_string(),
            // The legacy gateway speaks a fixed-order, pipe-delimited line.
            AccountType::Legacy => format!(
                "ACCT|{}|PASSBOOK SAVINGS|ACTIVE|USD|{:.2}|{}",
                account_id,
                amount,
                now.format("%Y%m%d%H%M%S")
            ),
            AccountType::Crypto => json!({
                "wallet_id": account_id,
                "label": "Primary Wallet",
                "wallet_status": "unlocked",
                "assets": [
                    { "symbol": "BTC", "amount": amount / 40_000.0, "fiat_value": amount },
                    { "symbol": "ETH", "amount": amount / 2_500.0, "fiat_value": amount * 1.6 },
                ],
                "synced_at": now.to_rfc3339(),
            })
            .to_string(),
        }
    }
}

/// FNV-1a over the account id, so a given account always reports the same
/// balances regardless of when or how often it is fetched.
fn seed(account_id: &str) -> u64 {
    account_id.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn pseudo_amount(account_id: &str) -> f64 {
    (seed(account_id) % 900_000) as f64 / 100.0 + 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_backend_answers_known_accounts() {
        let backend = SimulatedBackend::new("bank-service", AccountType::Bank);
        let payload = backend.call("bank-001").await.unwrap();
        assert!(payload.contains("\"acct_no\":\"bank-001\""));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_suffix_is_an_authoritative_not_found() {
        let backend = SimulatedBackend::new("bank-service", AccountType::Bank);
        assert_eq!(backend.call("bank-999").await.unwrap_err(), FetchError::NotFound);
        assert_eq!(backend.call("bank-abc").await.unwrap_err(), FetchError::NotFound);
    }

    #[tokio::test]
    async fn payloads_are_deterministic_per_account() {
        let backend = SimulatedBackend::new("legacy-gateway", AccountType::Legacy);
        let first = backend.call("legacy-007").await.unwrap();
        let second = backend.call("legacy-007").await.unwrap();
        // Same balance field every time; only the timestamp differs.
        assert_eq!(
            first.split('|').nth(5).unwrap(),
            second.split('|').nth(5).unwrap()
        );
    }

    #[tokio::test]
    async fn error_mode_fails_every_call() {
        let backend = SimulatedBackend::new("bank-service", AccountType::Bank);
        backend.set_mode(BackendMode::Error, None);
        let err = backend.call("bank-001").await.unwrap_err();
        assert!(matches!(err, FetchError::Backend(_)));
    }

    #[tokio::test]
    async fn flaky_mode_alternates_fault_and_answer() {
        let backend = SimulatedBackend::new("bank-service", AccountType::Bank);
        backend.set_mode(BackendMode::Flaky, None);
        assert!(backend.call("bank-001").await.is_err());
        assert!(backend.call("bank-001").await.is_ok());
        assert!(backend.call("bank-001").await.is_err());
    }
}

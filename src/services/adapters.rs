// src/services/adapters.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::{AccountSummary, AccountType, Balance, Owner};
use crate::services::backend::SimulatedBackend;
use crate::services::resilience::{FetchError, Resilience, ResilienceConfig};

/// Translation seam between one backend's native wire shape and the
/// canonical model. Fails with `NotFound` or `Backend`; unknown or missing
/// optional fields map to absent, never to sentinel values.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn backend_name(&self) -> &str;
    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError>;
}

fn malformed(backend: &str, err: impl std::fmt::Display) -> FetchError {
    FetchError::Backend(format!("{} returned a malformed payload: {}", backend, err))
}

// ---------------------------------------------------------------------------
// bank-service: JSON with snake_case field names and a nested holder block.

pub struct BankAdapter {
    backend: Arc<SimulatedBackend>,
}

#[derive(Deserialize)]
struct BankHolderWire {
    full_name: String,
    cust_ref: String,
}

#[derive(Deserialize)]
struct BankWire {
    acct_no: String,
    acct_name: Option<String>,
    acct_status: Option<String>,
    holder: Option<BankHolderWire>,
    curr: String,
    avail_bal: f64,
    ledger_bal: Option<f64>,
    as_of: DateTime<Utc>,
}

#[async_trait]
impl BackendAdapter for BankAdapter {
    fn backend_name(&self) -> &str {
        "bank-service/v1"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        let wire: BankWire =
            serde_json::from_str(&raw).map_err(|e| malformed(self.backend_name(), e))?;
        Ok(AccountSummary {
            account_id: wire.acct_no,
            account_type: AccountType::Bank,
            backend_source: self.backend_name().to_string(),
            display_name: wire.acct_name,
            status: wire.acct_status,
            owner: wire.holder.map(|h| Owner {
                name: h.full_name,
                customer_id: h.cust_ref,
            }),
            balances: vec![Balance {
                currency: wire.curr,
                available: wire.avail_bal,
                ledger: wire.ledger_bal,
            }],
            metadata: Map::new(),
            last_updated: wire.as_of,
            stale: false,
            trace_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// card-service: camelCase JSON; current balance rides as the ledger figure.

pub struct CardAdapter {
    backend: Arc<SimulatedBackend>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardWire {
    card_account_id: String,
    product_name: Option<String>,
    card_state: Option<String>,
    currency_code: String,
    current_balance: f64,
    credit_available: f64,
    credit_limit: Option<f64>,
    last_synced_at: DateTime<Utc>,
}

#[async_trait]
impl BackendAdapter for CardAdapter {
    fn backend_name(&self) -> &str {
        "card-service/v2"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        let wire: CardWire =
            serde_json::from_str(&raw).map_err(|e| malformed(self.backend_name(), e))?;
        let mut metadata = Map::new();
        if let Some(limit) = wire.credit_limit {
            metadata.insert("creditLimit".into(), limit.into());
        }
        Ok(AccountSummary {
            account_id: wire.card_account_id,
            account_type: AccountType::CreditCard,
            backend_source: self.backend_name().to_string(),
            display_name: wire.product_name,
            status: wire.card_state,
            owner: None,
            balances: vec![Balance {
                currency: wire.currency_code,
                available: wire.credit_available,
                ledger: Some(wire.current_balance),
            }],
            metadata,
            last_updated: wire.last_synced_at,
            stale: false,
            trace_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// loan-service: snake_case JSON; outstanding principal is the one balance.

pub struct LoanAdapter {
    backend: Arc<SimulatedBackend>,
}

#[derive(Deserialize)]
struct LoanBorrowerWire {
    name: String,
    customer_no: String,
}

#[derive(Deserialize)]
struct LoanWire {
    loan_ref: String,
    loan_product: Option<String>,
    loan_status: Option<String>,
    ccy: String,
    outstanding_principal: f64,
    borrower: Option<LoanBorrowerWire>,
    next_payment_due: Option<String>,
    as_of_ts: DateTime<Utc>,
}

#[async_trait]
impl BackendAdapter for LoanAdapter {
    fn backend_name(&self) -> &str {
        "loan-service/v1"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        let wire: LoanWire =
            serde_json::from_str(&raw).map_err(|e| malformed(self.backend_name(), e))?;
        let mut metadata = Map::new();
        if let Some(due) = wire.next_payment_due {
            metadata.insert("nextPaymentDue".into(), due.into());
        }
        Ok(AccountSummary {
            account_id: wire.loan_ref,
            account_type: AccountType::Loan,
            backend_source: self.backend_name().to_string(),
            display_name: wire.loan_product,
            status: wire.loan_status,
            owner: wire.borrower.map(|b| Owner {
                name: b.name,
                customer_id: b.customer_no,
            }),
            balances: vec![Balance {
                currency: wire.ccy,
                available: wire.outstanding_principal,
                ledger: None,
            }],
            metadata,
            last_updated: wire.as_of_ts,
            stale: false,
            trace_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// investment-service: camelCase JSON with cash and market-value figures.

pub struct InvestmentAdapter {
    backend: Arc<SimulatedBackend>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvestmentWire {
    portfolio_id: String,
    portfolio_name: Option<String>,
    state: Option<String>,
    base_currency: String,
    cash_balance: f64,
    market_value: Option<f64>,
    valued_at: DateTime<Utc>,
}

#[async_trait]
impl BackendAdapter for InvestmentAdapter {
    fn backend_name(&self) -> &str {
        "investment-service/v3"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        let wire: InvestmentWire =
            serde_json::from_str(&raw).map_err(|e| malformed(self.backend_name(), e))?;
        Ok(AccountSummary {
            account_id: wire.portfolio_id,
            account_type: AccountType::Investment,
            backend_source: self.backend_name().to_string(),
            display_name: wire.portfolio_name,
            status: wire.state,
            owner: None,
            balances: vec![Balance {
                currency: wire.base_currency,
                available: wire.cash_balance,
                ledger: wire.market_value,
            }],
            metadata: Map::new(),
            last_updated: wire.valued_at,
            stale: false,
            trace_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// legacy-gateway: one pipe-delimited line,
// ACCT|<id>|<name>|<status>|<currency>|<balance>|<yyyymmddhhmmss>.

pub struct LegacyAdapter {
    backend: Arc<SimulatedBackend>,
}

impl LegacyAdapter {
    fn parse(&self, raw: &str) -> Result<AccountSummary, FetchError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .has_headers(false)
            .from_reader(raw.as_bytes());
        let record = reader
            .records()
            .next()
            .ok_or_else(|| malformed(self.backend_name(), "empty response"))?
            .map_err(|e| malformed(self.backend_name(), e))?;
        if record.len() != 7 || &record[0] != "ACCT" {
            return Err(malformed(self.backend_name(), "unexpected record shape"));
        }
        let available: f64 = record[5]
            .trim()
            .parse()
            .map_err(|e| malformed(self.backend_name(), e))?;
        let last_updated = NaiveDateTime::parse_from_str(record[6].trim(), "%Y%m%d%H%M%S")
            .map_err(|e| malformed(self.backend_name(), e))?
            .and_utc();
        Ok(AccountSummary {
            account_id: record[1].to_string(),
            account_type: AccountType::Legacy,
            backend_source: self.backend_name().to_string(),
            display_name: Some(record[2].to_string()),
            status: Some(record[3].to_string()),
            owner: None,
            balances: vec![Balance {
                currency: record[4].to_string(),
                available,
                ledger: None,
            }],
            metadata: Map::new(),
            last_updated,
            stale: false,
            trace_id: None,
        })
    }
}

#[async_trait]
impl BackendAdapter for LegacyAdapter {
    fn backend_name(&self) -> &str {
        "legacy-gateway/v1"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        self.parse(&raw)
    }
}

// ---------------------------------------------------------------------------
// crypto-service: multi-asset wallets have no single balance; the asset
// list lands in metadata instead.

pub struct CryptoAdapter {
    backend: Arc<SimulatedBackend>,
}

#[derive(Deserialize)]
struct CryptoWire {
    wallet_id: String,
    label: Option<String>,
    wallet_status: Option<String>,
    assets: Vec<Value>,
    synced_at: DateTime<Utc>,
}

#[async_trait]
impl BackendAdapter for CryptoAdapter {
    fn backend_name(&self) -> &str {
        "crypto-service/v1"
    }

    async fn fetch(&self, account_id: &str) -> Result<AccountSummary, FetchError> {
        let raw = self.backend.call(account_id).await?;
        let wire: CryptoWire =
            serde_json::from_str(&raw).map_err(|e| malformed(self.backend_name(), e))?;
        let mut metadata = Map::new();
        metadata.insert("assets".into(), Value::Array(wire.assets));
        Ok(AccountSummary {
            account_id: wire.wallet_id,
            account_type: AccountType::Crypto,
            backend_source: self.backend_name().to_string(),
            display_name: wire.label,
            status: wire.wallet_status,
            owner: None,
            balances: vec![],
            metadata,
            last_updated: wire.synced_at,
            stale: false,
            trace_id: None,
        })
    }
}

// ---------------------------------------------------------------------------

/// Everything one backend needs at the call site: its adapter, its
/// resilience policy, and (for admin control) its simulator handle.
pub struct BackendHandle {
    pub adapter: Arc<dyn BackendAdapter>,
    pub resilience: Arc<Resilience>,
    pub simulator: Arc<SimulatedBackend>,
}

/// Static account-type → backend mapping, resolved once at startup.
pub struct AdapterRegistry {
    handles: HashMap<AccountType, BackendHandle>,
}

impl AdapterRegistry {
    pub fn with_simulated_backends(config: &ResilienceConfig) -> Self {
        let mut handles = HashMap::new();

        let bank = Arc::new(SimulatedBackend::new("bank-service", AccountType::Bank));
        handles.insert(
            AccountType::Bank,
            BackendHandle {
                adapter: Arc::new(BankAdapter {
                    backend: Arc::clone(&bank),
                }) as Arc<dyn BackendAdapter>,
                resilience: Arc::new(Resilience::new("bank-service", config.clone())),
                simulator: bank,
            },
        );

        let card = Arc::new(SimulatedBackend::new("card-service", AccountType::CreditCard));
        handles.insert(
            AccountType::CreditCard,
            BackendHandle {
                adapter: Arc::new(CardAdapter {
                    backend: Arc::clone(&card),
                }),
                resilience: Arc::new(Resilience::new("card-service", config.clone())),
                simulator: card,
            },
        );

        let loan = Arc::new(SimulatedBackend::new("loan-service", AccountType::Loan));
        handles.insert(
            AccountType::Loan,
            BackendHandle {
                adapter: Arc::new(LoanAdapter {
                    backend: Arc::clone(&loan),
                }),
                resilience: Arc::new(Resilience::new("loan-service", config.clone())),
                simulator: loan,
            },
        );

        let invest = Arc::new(SimulatedBackend::new(
            "investment-service",
            AccountType::Investment,
        ));
        handles.insert(
            AccountType::Investment,
            BackendHandle {
                adapter: Arc::new(InvestmentAdapter {
                    backend: Arc::clone(&invest),
                }),
                resilience: Arc::new(Resilience::new("investment-service", config.clone())),
                simulator: invest,
            },
        );

        let legacy = Arc::new(SimulatedBackend::new("legacy-gateway", AccountType::Legacy));
        handles.insert(
            AccountType::Legacy,
            BackendHandle {
                adapter: Arc::new(LegacyAdapter {
                    backend: Arc::clone(&legacy),
                }),
                resilience: Arc::new(Resilience::new("legacy-gateway", config.clone())),
                simulator: legacy,
            },
        );

        let crypto = Arc::new(SimulatedBackend::new("crypto-service", AccountType::Crypto));
        handles.insert(
            AccountType::Crypto,
            BackendHandle {
                adapter: Arc::new(CryptoAdapter {
                    backend: Arc::clone(&crypto),
                }),
                resilience: Arc::new(Resilience::new("crypto-service", config.clone())),
                simulator: crypto,
            },
        );

        debug!("adapter registry built with {} backends", handles.len());
        AdapterRegistry { handles }
    }

    /// Looks up the backend owning an account id, by prefix.
    pub fn handle_for(&self, account_id: &str) -> Option<&BackendHandle> {
        let account_type = AccountType::from_account_id(account_id)?;
        self.handles.get(&account_type)
    }

    /// Admin lookup by backend service name.
    pub fn simulator(&self, backend_name: &str) -> Option<&Arc<SimulatedBackend>> {
        self.handles
            .values()
            .map(|h| &h.simulator)
            .find(|s| s.name() == backend_name)
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.handles.values().map(|h| h.simulator.name()).collect()
    }
}

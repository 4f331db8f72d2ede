// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend family an account belongs to. Determines adapter routing and
/// the cache TTL applied to its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    CreditCard,
    Loan,
    Investment,
    Legacy,
    Crypto,
}

impl AccountType {
    /// Routes an account identifier to its backend family by prefix.
    /// Returns `None` for prefixes no backend owns.
    pub fn from_account_id(account_id: &str) -> Option<AccountType> {
        let prefix = account_id.split('-').next()?;
        match prefix {
            "bank" => Some(AccountType::Bank),
            "card" => Some(AccountType::CreditCard),
            "loan" => Some(AccountType::Loan),
            "invest" => Some(AccountType::Investment),
            "legacy" => Some(AccountType::Legacy),
            "crypto" => Some(AccountType::Crypto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub name: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub currency: String,
    pub available: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<f64>,
}

/// Canonical account record every backend shape is normalized into.
///
/// `stale` is only ever true on a response assembled from an expired cache
/// entry after a failed refetch; the cache never stores it set. `trace_id`
/// is attached per request at the HTTP boundary, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_id: String,
    pub account_type: AccountType,
    pub backend_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Ok,
    Partial,
    Error,
}

/// Outcome of one account within a multi-account request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    pub account_id: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AccountSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub request_id: String,
    pub trace_id: String,
    pub overall_status: OverallStatus,
    pub results: Vec<AccountResult>,
}

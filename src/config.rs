// src/config.rs
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::cache::TtlPolicy;
use crate::services::resilience::ResilienceConfig;

/// Runtime configuration, read from the environment with sensible
/// defaults. Every knob here is tunable without a rebuild.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    /// Upper bound on a whole multi-account fan-out; deliberately longer
    /// than any single backend's own call timeout.
    pub overall_timeout: Duration,
    pub resilience: ResilienceConfig,
    pub ttls: TtlPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: 3030,
            overall_timeout: Duration::from_secs(5),
            resilience: ResilienceConfig::default(),
            ttls: TtlPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();
        let resilience = ResilienceConfig {
            call_timeout: millis("BACKEND_TIMEOUT_MS", defaults.resilience.call_timeout)?,
            max_attempts: parsed("RETRY_MAX_ATTEMPTS", defaults.resilience.max_attempts)?,
            base_backoff: millis("RETRY_BASE_BACKOFF_MS", defaults.resilience.base_backoff)?,
            failure_threshold: parsed(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.resilience.failure_threshold,
            )?,
            open_for: millis("BREAKER_OPEN_MS", defaults.resilience.open_for)?,
            max_in_flight: parsed("BULKHEAD_MAX_IN_FLIGHT", defaults.resilience.max_in_flight)?,
        };
        let ttls = TtlPolicy {
            bank: secs("CACHE_TTL_BANK_SECS", defaults.ttls.bank)?,
            creditcard: secs("CACHE_TTL_CREDITCARD_SECS", defaults.ttls.creditcard)?,
            loan: secs("CACHE_TTL_LOAN_SECS", defaults.ttls.loan)?,
            investment: secs("CACHE_TTL_INVESTMENT_SECS", defaults.ttls.investment)?,
            legacy: secs("CACHE_TTL_LEGACY_SECS", defaults.ttls.legacy)?,
            crypto: secs("CACHE_TTL_CRYPTO_SECS", defaults.ttls.crypto)?,
        };
        Ok(Settings {
            port: parsed("PORT", defaults.port)?,
            overall_timeout: millis("OVERALL_TIMEOUT_MS", defaults.overall_timeout)?,
            resilience,
            ttls,
        })
    }
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn millis(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_millis(parsed(
        key,
        default.as_millis() as u64,
    )?))
}

fn secs(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(parsed(key, default.as_secs())?))
}

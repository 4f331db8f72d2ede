// src/services/aggregator.rs
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use uuid::Uuid;

use crate::models::{AccountResult, AggregateResponse, ItemStatus, OverallStatus};
use crate::services::resolver::AccountResolver;

/// Multi-account path: one task per identifier, joined in request order
/// under a shared deadline. One item's failure never cancels or corrupts
/// a sibling; items unsettled at the deadline are forced to unavailable.
pub struct Aggregator {
    resolver: Arc<AccountResolver>,
    overall_timeout: Duration,
}

impl Aggregator {
    pub fn new(resolver: Arc<AccountResolver>, overall_timeout: Duration) -> Self {
        Aggregator {
            resolver,
            overall_timeout,
        }
    }

    pub async fn aggregate(
        &self,
        ids: Vec<String>,
        bypass_cache: bool,
        trace_id: &str,
    ) -> AggregateResponse {
        let request_id = Uuid::new_v4().to_string();
        debug!(
            "aggregate request {} for {} accounts (bypass: {})",
            request_id,
            ids.len(),
            bypass_cache
        );

        let deadline = tokio::time::Instant::now() + self.overall_timeout;
        let tasks: Vec<(String, tokio::task::JoinHandle<_>)> = ids
            .into_iter()
            .map(|id| {
                let resolver = Arc::clone(&self.resolver);
                let task_id = id.clone();
                let handle = tokio::spawn(async move {
                    let started = std::time::Instant::now();
                    let outcome = resolver.resolve(&task_id, bypass_cache).await;
                    (outcome, started.elapsed().as_millis() as u64)
                });
                (id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (account_id, mut handle) in tasks {
            let result = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok((Ok(data), latency_ms))) => AccountResult {
                    account_id,
                    status: ItemStatus::Ok,
                    data: Some(data),
                    error: None,
                    latency_ms,
                },
                Ok(Ok((Err(err), latency_ms))) => AccountResult {
                    account_id,
                    status: ItemStatus::Unavailable,
                    data: None,
                    error: Some(err.to_string()),
                    latency_ms,
                },
                Ok(Err(join_err)) => {
                    warn!("resolution task for {} failed: {}", account_id, join_err);
                    AccountResult {
                        account_id,
                        status: ItemStatus::Unavailable,
                        data: None,
                        error: Some("account resolution task failed".to_string()),
                        latency_ms: 0,
                    }
                }
                Err(_) => {
                    // Best-effort cancellation; the response is assembled
                    // without waiting for the network call to stop.
                    handle.abort();
                    warn!("request deadline elapsed while resolving {}", account_id);
                    AccountResult {
                        account_id,
                        status: ItemStatus::Unavailable,
                        data: None,
                        error: Some("request deadline exceeded".to_string()),
                        latency_ms: self.overall_timeout.as_millis() as u64,
                    }
                }
            };
            results.push(result);
        }

        let ok_count = results.iter().filter(|r| r.status == ItemStatus::Ok).count();
        let overall_status = if ok_count == results.len() {
            OverallStatus::Ok
        } else if ok_count == 0 {
            OverallStatus::Error
        } else {
            OverallStatus::Partial
        };

        AggregateResponse {
            request_id,
            trace_id: trace_id.to_string(),
            overall_status,
            results,
        }
    }
}

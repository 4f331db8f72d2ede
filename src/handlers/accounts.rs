// src/handlers/accounts.rs
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use super::error::ApiError;
use super::{new_trace_id, wants_bypass};
use crate::models::OverallStatus;
use crate::services::resolver::ResolveError;
use crate::state::AppState;

/// GET /accounts/{accountId}
pub async fn get_account(
    account_id: String,
    cache_control: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    let trace_id = new_trace_id();
    let bypass = wants_bypass(cache_control.as_deref());
    info!(
        "GET /accounts/{} trace={} bypass={}",
        account_id, trace_id, bypass
    );

    match state.resolver.resolve(&account_id, bypass).await {
        Ok(mut record) => {
            record.trace_id = Some(trace_id);
            Ok(warp::reply::json(&record))
        }
        Err(ResolveError::NotFound(id)) => Err(warp::reject::custom(ApiError::not_found(
            format!("no account found for {}", id),
            trace_id,
        ))),
        Err(ResolveError::Unavailable(id, reason)) => Err(warp::reject::custom(
            ApiError::unavailable(format!("account {} is unavailable: {}", id, reason), trace_id),
        )),
    }
}

/// GET /accounts?ids=a,b,c
pub async fn get_accounts(
    query: HashMap<String, String>,
    cache_control: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    let trace_id = new_trace_id();
    let ids: Vec<String> = query
        .get("ids")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(warp::reject::custom(ApiError::validation(
            "missing required query parameter: ids (comma-separated account ids)",
            trace_id,
        )));
    }

    let bypass = wants_bypass(cache_control.as_deref());
    info!(
        "GET /accounts trace={} ids={} bypass={}",
        trace_id,
        ids.len(),
        bypass
    );

    let response = state.aggregator.aggregate(ids, bypass, &trace_id).await;
    let status = match response.overall_status {
        OverallStatus::Ok => StatusCode::OK,
        OverallStatus::Partial => StatusCode::PARTIAL_CONTENT,
        OverallStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };
    debug!(
        "aggregate {} settled as {:?}",
        response.request_id, response.overall_status
    );
    Ok(with_status(warp::reply::json(&response), status))
}

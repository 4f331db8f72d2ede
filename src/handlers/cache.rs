// src/handlers/cache.rs
use std::sync::Arc;

use log::info;
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use crate::state::AppState;

/// DELETE /cache/{accountId}
pub async fn invalidate_account(
    account_id: String,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    info!("DELETE /cache/{}", account_id);
    state.cache.invalidate(&account_id);
    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

/// DELETE /cache
pub async fn invalidate_all(state: Arc<AppState>) -> Result<impl warp::Reply, Rejection> {
    let dropped = state.cache.invalidate_all();
    info!("DELETE /cache dropped {} entries", dropped);
    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

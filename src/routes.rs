// src/routes.rs
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use log::{error, info};
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::accounts::{get_account, get_accounts};
use crate::handlers::admin::set_backend_mode;
use crate::handlers::cache::{invalidate_account, invalidate_all};
use crate::handlers::error::ApiError;
use crate::handlers::new_trace_id;
use crate::state::AppState;

// Every error body carries a trace id so failures can be correlated from
// support tickets.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message, trace_id) = if let Some(api_error) = err.find::<ApiError>() {
        (
            api_error.status(),
            api_error.message.clone(),
            api_error.trace_id.clone(),
        )
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            "Not Found".to_string(),
            new_trace_id(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
            new_trace_id(),
        )
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            "Malformed request".to_string(),
            new_trace_id(),
        )
    } else {
        error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
            new_trace_id(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
            "traceId": trace_id,
        })),
        code,
    ))
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let account_route = warp::path!("accounts" / String)
        .and(warp::get())
        .and(warp::header::optional::<String>("cache-control"))
        .and(state_filter.clone())
        .and_then(get_account);

    let accounts_route = warp::path!("accounts")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::optional::<String>("cache-control"))
        .and(state_filter.clone())
        .and_then(get_accounts);

    let cache_key_route = warp::path!("cache" / String)
        .and(warp::delete())
        .and(state_filter.clone())
        .and_then(invalidate_account);

    let cache_all_route = warp::path!("cache")
        .and(warp::delete())
        .and(state_filter.clone())
        .and_then(invalidate_all);

    let admin_mode_route = warp::path!("admin" / "backends" / String / "mode")
        .and(warp::put())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(set_backend_mode);

    info!("All routes configured successfully.");

    account_route
        .or(accounts_route)
        .or(cache_key_route)
        .or(cache_all_route)
        .or(admin_mode_route)
        .recover(handle_rejection)
}

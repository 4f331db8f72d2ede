// src/handlers/admin.rs
use std::sync::Arc;

use log::info;
use serde::Deserialize;
use serde_json::json;
use warp::Rejection;

use super::error::ApiError;
use super::new_trace_id;
use crate::services::backend::BackendMode;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeRequest {
    pub mode: BackendMode,
    pub latency_ms: Option<u64>,
}

/// PUT /admin/backends/{backend}/mode — test/ops control of a backend
/// simulator. The core resolver and resilience logic stay oblivious: from
/// their side the backend simply starts behaving this way.
pub async fn set_backend_mode(
    backend: String,
    body: ModeRequest,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    match state.registry.simulator(&backend) {
        Some(simulator) => {
            simulator.set_mode(body.mode, body.latency_ms);
            info!("admin set {} to {:?}", backend, body.mode);
            Ok(warp::reply::json(&json!({
                "backend": backend,
                "mode": body.mode,
            })))
        }
        None => Err(warp::reject::custom(ApiError::not_found(
            format!("unknown backend: {}", backend),
            new_trace_id(),
        ))),
    }
}

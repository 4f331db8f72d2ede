// tests/api.rs
//
// End-to-end behavior through the HTTP boundary: cache freshness, bypass,
// stale fallback, not-found precedence, invalidation, aggregate status
// codes, and the admin simulation controls.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use account_gateway::config::Settings;
use account_gateway::models::{AccountSummary, AggregateResponse, ItemStatus, OverallStatus};
use account_gateway::routes::routes;
use account_gateway::services::backend::BackendMode;
use account_gateway::services::resilience::ResilienceConfig;
use account_gateway::state::AppState;

fn test_settings() -> Settings {
    Settings {
        overall_timeout: Duration::from_secs(2),
        resilience: ResilienceConfig {
            call_timeout: Duration::from_millis(200),
            max_attempts: 1,
            base_backoff: Duration::from_millis(1),
            failure_threshold: 100,
            open_for: Duration::from_millis(50),
            max_in_flight: 8,
        },
        ..Settings::default()
    }
}

fn app() -> Arc<AppState> {
    AppState::new(test_settings())
}

fn backend_calls(state: &AppState, name: &str) -> u64 {
    state.registry.simulator(name).unwrap().calls()
}

#[tokio::test]
async fn single_account_lifecycle_scenario() {
    let state = app();
    let api = routes(state.clone());

    // Cold cache: 200, no stale flag, trace id present.
    let res = warp::test::request()
        .path("/accounts/bank-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let first: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(first.get("stale").is_none());
    assert_eq!(first["traceId"].as_str().unwrap().len(), 32);
    assert_eq!(backend_calls(&state, "bank-service"), 1);

    // Warm cache: identical balances, no backend call.
    let res = warp::test::request()
        .path("/accounts/bank-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let second: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(first["balances"], second["balances"]);
    assert_eq!(backend_calls(&state, "bank-service"), 1);

    // Backend forced into error mode + bypass: old truth, flagged stale.
    let res = warp::test::request()
        .method("PUT")
        .path("/admin/backends/bank-service/mode")
        .json(&json!({ "mode": "error" }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let res = warp::test::request()
        .path("/accounts/bank-001")
        .header("cache-control", "no-cache")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let stale: AccountSummary = serde_json::from_slice(res.body()).unwrap();
    assert!(stale.stale);
    assert_eq!(stale.account_id, "bank-001");

    // Recover the backend, drop the cached entry: fresh data again.
    let res = warp::test::request()
        .method("PUT")
        .path("/admin/backends/bank-service/mode")
        .json(&json!({ "mode": "healthy" }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let res = warp::test::request()
        .method("DELETE")
        .path("/cache/bank-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 204);

    let calls_before = backend_calls(&state, "bank-service");
    let res = warp::test::request()
        .path("/accounts/bank-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let refreshed: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(refreshed.get("stale").is_none());
    assert_eq!(backend_calls(&state, "bank-service"), calls_before + 1);
}

#[tokio::test]
async fn bypass_triggers_backend_call_despite_fresh_cache() {
    let state = app();
    let api = routes(state.clone());

    warp::test::request().path("/accounts/card-001").reply(&api).await;
    assert_eq!(backend_calls(&state, "card-service"), 1);

    let res = warp::test::request()
        .path("/accounts/card-001")
        .header("cache-control", "no-cache")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    assert_eq!(backend_calls(&state, "card-service"), 2);
}

#[tokio::test]
async fn unavailable_without_cache_fallback_is_503() {
    let state = app();
    let api = routes(state.clone());
    state
        .registry
        .simulator("loan-service")
        .unwrap()
        .set_mode(BackendMode::Error, None);

    let res = warp::test::request()
        .path("/accounts/loan-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 503);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
    assert_eq!(body["traceId"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn backend_not_found_is_404_with_trace_id() {
    let state = app();
    let api = routes(state);

    let res = warp::test::request()
        .path("/accounts/bank-999")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 404);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("bank-999"));
    assert!(body.get("traceId").is_some());
}

#[tokio::test]
async fn slow_backend_times_out_and_maps_to_503_when_uncached() {
    let state = app();
    let api = routes(state.clone());
    state
        .registry
        .simulator("investment-service")
        .unwrap()
        .set_mode(BackendMode::Slow, Some(1_000));

    let res = warp::test::request()
        .path("/accounts/invest-001")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 503);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body.get("traceId").is_some());
}

#[tokio::test]
async fn aggregate_partial_preserves_request_order() {
    let state = app();
    let api = routes(state);

    let res = warp::test::request()
        .path("/accounts?ids=bank-001,invalid-999")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 206);
    let body: AggregateResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.overall_status, OverallStatus::Partial);
    assert_eq!(body.results.len(), 2);
    assert_eq!(body.results[0].account_id, "bank-001");
    assert_eq!(body.results[0].status, ItemStatus::Ok);
    assert_eq!(body.results[1].account_id, "invalid-999");
    assert_eq!(body.results[1].status, ItemStatus::Unavailable);
    assert_eq!(body.trace_id.len(), 32);
}

#[tokio::test]
async fn aggregate_all_ok_is_200_and_all_unavailable_is_500() {
    let state = app();
    let api = routes(state);

    let res = warp::test::request()
        .path("/accounts?ids=bank-001,legacy-002,crypto-003")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    let body: AggregateResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.overall_status, OverallStatus::Ok);

    let res = warp::test::request()
        .path("/accounts?ids=invalid-1,invalid-2")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 500);
    let body: AggregateResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.overall_status, OverallStatus::Error);
    assert!(body.results.iter().all(|r| r.status == ItemStatus::Unavailable));
}

#[tokio::test]
async fn aggregate_without_ids_is_400() {
    let state = app();
    let api = routes(state);

    for path in ["/accounts", "/accounts?ids="] {
        let res = warp::test::request().path(path).reply(&api).await;
        assert_eq!(res.status(), 400, "path {}", path);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(body["error"].as_str().unwrap().contains("ids"));
        assert!(body.get("traceId").is_some());
    }
}

#[tokio::test]
async fn full_invalidation_forces_backend_calls_for_all_ids() {
    let state = app();
    let api = routes(state.clone());

    warp::test::request().path("/accounts/bank-001").reply(&api).await;
    warp::test::request().path("/accounts/card-001").reply(&api).await;
    assert_eq!(backend_calls(&state, "bank-service"), 1);
    assert_eq!(backend_calls(&state, "card-service"), 1);

    let res = warp::test::request()
        .method("DELETE")
        .path("/cache")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 204);
    assert!(state.cache.is_empty());

    warp::test::request().path("/accounts/bank-001").reply(&api).await;
    warp::test::request().path("/accounts/card-001").reply(&api).await;
    assert_eq!(backend_calls(&state, "bank-service"), 2);
    assert_eq!(backend_calls(&state, "card-service"), 2);
}

#[tokio::test]
async fn unknown_backend_mode_target_is_404() {
    let state = app();
    let api = routes(state);

    let res = warp::test::request()
        .method("PUT")
        .path("/admin/backends/no-such-service/mode")
        .json(&json!({ "mode": "error" }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), 404);
}

// src/handlers/mod.rs
pub mod accounts;
pub mod admin;
pub mod cache;
pub mod error;

use uuid::Uuid;

/// Correlation identifier attached to every response: 32 lowercase-hex
/// characters, fresh per request.
pub fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A `Cache-Control: no-cache` directive forces a backend fetch even when
/// a fresh cache entry exists.
pub fn wants_bypass(cache_control: Option<&str>) -> bool {
    cache_control.map_or(false, |value| {
        value.to_ascii_lowercase().contains("no-cache")
    })
}

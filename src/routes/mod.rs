use axum::{http::Uri, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

use crate::audit::AuditEvent;
use crate::cache::ResponseCache;
use crate::error::ApiResult;
use crate::AppState;

pub mod analytics;
pub mod audit_logs;
pub mod camps;
pub mod dashboard;
pub mod distributions;
pub mod donations;
pub mod recurring;
pub mod reports;
pub mod seed;
pub mod users;
pub mod webhook;

// Cache key prefixes, one per listing family.
pub const USERS: &str = "users";
pub const DONATIONS: &str = "donations";
pub const AUDIT_LOGS: &str = "audit-logs";
pub const ANALYTICS: &str = "analytics";
pub const DASHBOARD: &str = "dashboard";
pub const DISTRIBUTIONS: &str = "distributions";

/// Serves `load` through the response cache keyed by path and query.
pub(crate) async fn cached<T, Fut>(state: &AppState, prefix: &str, uri: &Uri, load: Fut) -> ApiResult<Json<Value>>
where
    T: Serialize,
    Fut: Future<Output = ApiResult<T>>,
{
    let key = ResponseCache::key(prefix, uri);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }
    let generation = state.cache.generation(prefix);
    let value = serde_json::to_value(load.await?).map_err(anyhow::Error::from)?;
    state.cache.insert_at(key, generation, value.clone());
    Ok(Json(value))
}

/// Persists an audit entry and drops cached views it affects. A failed
/// write is logged; the mutation it describes has already happened.
pub(crate) async fn record(state: &AppState, event: AuditEvent, at: DateTime<Utc>, touched: &[&str]) {
    let entry = event.into_entry(at);
    if let Err(e) = crate::db::log_audit(&state.db, &entry).await {
        tracing::error!("Failed to write audit entry {} ({}): {}", entry.id, entry.action, e);
    }
    state.cache.invalidate(touched);
    state.cache.invalidate(&[AUDIT_LOGS, DASHBOARD]);
}

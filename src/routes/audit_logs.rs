use axum::{
    extract::{Query, State},
    http::Uri,
    response::IntoResponse,
};
use serde_json::json;

use crate::audit::{suspicious_count, AuditFilter, AuditQuery};
use crate::auth::AdminUser;
use crate::db::{self, models::AuditLogEntry};
use crate::error::{ApiError, ApiResult};
use crate::pagination::paginate;
use crate::routes::{cached, AUDIT_LOGS};
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Loads candidates for the caller's filter and narrows them against the
/// dashboard's local clock.
pub(crate) async fn filtered_logs(state: &AppState, query: &AuditQuery) -> ApiResult<Vec<AuditLogEntry>> {
    let filter = AuditFilter::try_from(query).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let candidates = db::list_audit_logs(&state.db, filter.user_id.as_deref()).await?;
    Ok(filter.apply(candidates, &state.config.local_now()))
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<AuditQuery>,
) -> ApiResult<impl IntoResponse> {
    cached(&state, AUDIT_LOGS, &uri, async {
        let logs = filtered_logs(&state, &query).await?;
        let suspicious = suspicious_count(&logs);
        let (logs, pagination) = paginate(logs, query.page, query.limit, DEFAULT_PAGE_SIZE);
        Ok::<_, ApiError>(json!({ "logs": logs, "pagination": pagination, "suspicious": suspicious }))
    })
    .await
}

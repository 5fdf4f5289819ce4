use axum::{
    extract::{Path, Query, State, Json},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::auth::AdminUser;
use crate::db::{self, models::{AuditResource, Severity, VerificationStatus}};
use crate::error::{ApiError, ApiResult};
use crate::filters::{UserFilter, UserQuery};
use crate::pagination::paginate;
use crate::routes::{cached, record, ANALYTICS, AUDIT_LOGS, DASHBOARD, USERS};
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = UserFilter::try_from(&query).map_err(|e| ApiError::bad_request(e.to_string()))?;
    cached(&state, USERS, &uri, async {
        let users = filter.apply(db::list_users(&state.db).await?);
        let (users, pagination) = paginate(users, query.page, query.limit, DEFAULT_PAGE_SIZE);
        Ok::<_, ApiError>(json!({ "users": users, "pagination": pagination }))
    })
    .await
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub verified: bool,
    pub notes: Option<String>,
}

pub async fn verify_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = if req.verified {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Pending
    };
    let notes = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let now = Utc::now();

    let user = db::set_user_verification(&state.db, &id, status, notes, &admin.id, now)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let event = AuditEvent::new(admin.actor(), "update", AuditResource::User)
        .resource_id(&id)
        .details(format!("Updated user verification status to {}", status))
        .metadata(json!({ "field": "verification", "newValue": status, "notes": notes }))
        .client(&headers);
    record(&state, event, now, &[USERS, ANALYTICS]).await;
    tracing::info!("User {} verification set to {} by {}", id, status, admin.id);

    Ok(AxumJson(json!({
        "message": format!("User {} successfully", if req.verified { "verified" } else { "unverified" }),
        "user": user,
    })))
}

#[derive(Deserialize)]
pub struct FlagRequest {
    pub reason: Option<String>,
}

pub async fn flag_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FlagRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Flag reason is required"))?;
    let now = Utc::now();

    let user = db::flag_user(&state.db, &id, reason)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let event = AuditEvent::new(admin.actor(), "flag", AuditResource::User)
        .resource_id(&id)
        .severity(Severity::Warning)
        .details(format!("User flagged: {}", reason))
        .metadata(json!({ "reason": reason }))
        .client(&headers);
    record(&state, event, now, &[USERS, ANALYTICS]).await;
    tracing::info!("User {} flagged by {}", id, admin.id);

    Ok(AxumJson(json!({ "message": "User flagged successfully", "user": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let entry = AuditEvent::new(admin.actor(), "delete", AuditResource::User)
        .resource_id(&id)
        .severity(Severity::Critical)
        .details(format!("Deleted user {}", id))
        .client(&headers)
        .into_entry(now);

    if !db::delete_user(&state.db, &id, &entry).await? {
        return Err(ApiError::not_found("User not found"));
    }
    state.cache.invalidate(&[USERS, ANALYTICS, AUDIT_LOGS, DASHBOARD]);
    tracing::warn!("User {} deleted by {}", id, admin.id);

    Ok(AxumJson(json!({ "message": "User deleted successfully" })))
}

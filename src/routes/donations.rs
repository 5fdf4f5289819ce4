use axum::{
    extract::{State, Query, Json, Path},
    response::{IntoResponse, Json as AxumJson},
    http::{HeaderMap, Uri},
};
use serde::Deserialize;
use serde_json::json;
use chrono::Utc;

use crate::AppState;
use crate::audit::AuditEvent;
use crate::auth::AdminUser;
use crate::db::{self, models::{AuditResource, DonationStatus, Severity}};
use crate::error::{ApiError, ApiResult};
use crate::filters::{DonationFilter, DonationQuery};
use crate::pagination::paginate;
use crate::routes::{cached, record, ANALYTICS, DONATIONS};

const DEFAULT_PAGE_SIZE: usize = 10;

pub async fn list_donations(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<DonationQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = DonationFilter::try_from(&query).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let now = state.config.local_now();
    cached(&state, DONATIONS, &uri, async {
        let donations = filter.apply(db::list_donations(&state.db).await?, &now);
        let (donations, pagination) = paginate(donations, query.page, query.limit, DEFAULT_PAGE_SIZE);
        Ok::<_, ApiError>(json!({ "donations": donations, "pagination": pagination }))
    })
    .await
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_donation_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let raw = req
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Status is required"))?;
    let status = DonationStatus::parse_lenient(raw).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut donation = db::get_donation(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation not found"))?;

    let previous = donation.status;
    let now = Utc::now();
    donation.transition(status, req.notes.as_deref(), now);
    if !db::save_donation_status(&state.db, &donation).await? {
        return Err(ApiError::not_found("Donation not found"));
    }

    let severity = if status == DonationStatus::Flagged { Severity::Warning } else { Severity::Info };
    let event = AuditEvent::new(admin.actor(), "update", AuditResource::Donation)
        .resource_id(&id)
        .severity(severity)
        .details(format!("Donation status changed from {} to {}", previous, status))
        .metadata(json!({ "field": "status", "oldValue": previous, "newValue": status }))
        .client(&headers);
    record(&state, event, now, &[DONATIONS, ANALYTICS]).await;
    tracing::info!("Donation {} moved {} -> {} by {}", id, previous, status, admin.id);

    Ok(AxumJson(json!({ "message": "Donation status updated", "donation": donation })))
}

#[derive(Deserialize)]
pub struct FlagDonationRequest {
    pub reason: Option<String>,
}

pub async fn flag_donation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FlagDonationRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Flag reason is required"))?;

    let mut donation = db::get_donation(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation not found"))?;

    let now = Utc::now();
    donation.transition(DonationStatus::Flagged, None, now);
    donation.flag_reason = Some(reason.to_string());
    db::save_donation_status(&state.db, &donation).await?;

    let event = AuditEvent::new(admin.actor(), "flag", AuditResource::Donation)
        .resource_id(&id)
        .severity(Severity::Warning)
        .details(format!("Donation flagged: {}", reason))
        .metadata(json!({ "reason": reason }))
        .client(&headers);
    record(&state, event, now, &[DONATIONS, ANALYTICS]).await;
    tracing::info!("Donation {} flagged by {}", id, admin.id);

    Ok(AxumJson(json!({ "message": "Donation flagged successfully", "donation": donation })))
}

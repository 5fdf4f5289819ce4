use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::auth::AdminUser;
use crate::db::{self, models::{AuditResource, Distribution, DistributionStatus}};
use crate::error::{ApiError, ApiResult};
use crate::routes::{cached, record, ANALYTICS, DISTRIBUTIONS};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionQuery {
    pub status: Option<String>,
    pub distributor_id: Option<String>,
}

pub async fn list_distributions(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<DistributionQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(DistributionStatus::parse_lenient(raw).map_err(|e| ApiError::bad_request(e.to_string()))?),
    };
    let distributor = query.distributor_id.as_deref().map(str::trim).filter(|d| !d.is_empty());

    cached(&state, DISTRIBUTIONS, &uri, async {
        let distributions: Vec<Distribution> = db::list_distributions(&state.db)
            .await?
            .into_iter()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .filter(|d| distributor.map_or(true, |id| d.distributor_id == id))
            .collect();
        Ok::<_, ApiError>(json!({ "distributions": distributions }))
    })
    .await
}

async fn load(state: &AppState, id: &str) -> ApiResult<Distribution> {
    db::get_distribution(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Distribution not found"))
}

async fn store(state: &AppState, dist: &Distribution) -> ApiResult<()> {
    if !db::save_distribution(&state.db, dist).await? {
        return Err(ApiError::not_found("Distribution not found"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStatusRequest {
    pub status: Option<String>,
    pub people_served: Option<i64>,
    pub notes: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<DistributionStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let raw = req
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Status is required"))?;
    let status = DistributionStatus::parse_lenient(raw).map_err(|e| ApiError::bad_request(e.to_string()))?;
    if req.people_served.is_some_and(|n| n < 0) {
        return Err(ApiError::bad_request("peopleServed must not be negative"));
    }

    let mut dist = load(&state, &id).await?;
    let previous = dist.status;
    let now = Utc::now();
    dist.status = status;
    if status == DistributionStatus::Completed && dist.end_time.is_none() {
        dist.end_time = Some(now);
    }
    if let Some(n) = req.people_served {
        dist.people_served = Some(n);
    }
    if let Some(notes) = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        dist.notes = Some(notes.to_string());
    }
    store(&state, &dist).await?;

    let event = AuditEvent::new(admin.actor(), "update", AuditResource::Distribution)
        .resource_id(&id)
        .details(format!("Distribution status changed from {} to {}", previous, status))
        .metadata(json!({ "field": "status", "oldValue": previous, "newValue": status }))
        .client(&headers);
    record(&state, event, now, &[DISTRIBUTIONS, ANALYTICS]).await;
    tracing::info!("Distribution {} moved {} -> {} by {}", id, previous, status, admin.id);

    Ok(AxumJson(json!({ "message": "Distribution status updated", "distribution": dist })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateRequest {
    #[serde(default)]
    pub donation_ids: Vec<String>,
}

pub async fn allocate_donations(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AllocateRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.donation_ids.is_empty() {
        return Err(ApiError::bad_request("donationIds must not be empty"));
    }
    let mut dist = load(&state, &id).await?;
    for donation_id in &req.donation_ids {
        if db::get_donation(&state.db, donation_id.trim()).await?.is_none() {
            return Err(ApiError::bad_request(format!("Unknown donation: {}", donation_id)));
        }
    }

    let added = dist.allocate_donations(&req.donation_ids);
    store(&state, &dist).await?;

    let now = Utc::now();
    let event = AuditEvent::new(admin.actor(), "update", AuditResource::Distribution)
        .resource_id(&id)
        .details(format!("Allocated {} donation(s) to distribution", added))
        .metadata(json!({ "field": "donationIds", "added": added, "donationIds": req.donation_ids }))
        .client(&headers);
    record(&state, event, now, &[DISTRIBUTIONS]).await;

    Ok(AxumJson(json!({ "message": "Donations allocated", "distribution": dist })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub volunteer_ids: Vec<String>,
}

pub async fn assign_volunteers(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssignRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.volunteer_ids.is_empty() {
        return Err(ApiError::bad_request("volunteerIds must not be empty"));
    }
    let mut dist = load(&state, &id).await?;
    for volunteer_id in &req.volunteer_ids {
        if db::get_user(&state.db, volunteer_id.trim()).await?.is_none() {
            return Err(ApiError::bad_request(format!("Unknown volunteer: {}", volunteer_id)));
        }
    }

    let added = dist.assign_volunteers(&req.volunteer_ids);
    store(&state, &dist).await?;

    let now = Utc::now();
    let event = AuditEvent::new(admin.actor(), "update", AuditResource::Distribution)
        .resource_id(&id)
        .details(format!("Assigned {} volunteer(s) to distribution", added))
        .metadata(json!({ "field": "volunteerIds", "added": added, "volunteerIds": req.volunteer_ids }))
        .client(&headers);
    record(&state, event, now, &[DISTRIBUTIONS]).await;

    Ok(AxumJson(json!({ "message": "Volunteers assigned", "distribution": dist })))
}

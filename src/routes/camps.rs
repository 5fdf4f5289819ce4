use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json as AxumJson},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::auth::AuthenticatedUser;
use crate::db::{self, models::{AuditResource, EventType, ReliefCamp, Role, Severity}};
use crate::error::{ApiError, ApiResult};
use crate::geo::{nearby_responders, NOTIFY_RADIUS_KM};
use crate::routes::record;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampRequest {
    pub event_type: EventType,
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub resources_needed: Vec<String>,
}

fn check_coordinates(latitude: f64, longitude: f64) -> ApiResult<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::bad_request("Coordinates out of range"));
    }
    Ok(())
}

/// Logs a notification for every responder near the camp and reports which
/// groups were reached as `(volunteers, ngos)`.
async fn notify_nearby(state: &AppState, camp: &ReliefCamp, message: &str) -> ApiResult<(bool, bool)> {
    let users = db::list_users(&state.db).await?;
    let nearby = nearby_responders(&users, camp.latitude, camp.longitude, NOTIFY_RADIUS_KM);
    for user in &nearby {
        tracing::info!(camp = %camp.id, user = %user.id, email = %user.email, "Notify {}: {}", user.name, message);
    }
    let volunteers = nearby.iter().any(|u| matches!(u.role, Role::Volunteer | Role::Donor));
    let ngos = nearby.iter().any(|u| u.role == Role::Distributor);
    Ok((volunteers, ngos))
}

pub async fn create_camp(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateCampRequest>,
) -> ApiResult<impl IntoResponse> {
    check_coordinates(req.latitude, req.longitude)?;
    let demand = state
        .ml
        .forecast_demand(req.event_type, req.latitude, req.longitude)
        .await;

    let now = Utc::now();
    let resources_needed = req
        .resources_needed
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    let mut camp = ReliefCamp {
        id: format!("camp_{}", Uuid::new_v4().simple()),
        event_type: req.event_type,
        latitude: req.latitude,
        longitude: req.longitude,
        start_date: req.start_date,
        resources_needed,
        created_by: user.id.clone(),
        demand_prediction: demand,
        volunteers_alerted: false,
        ngo_alerted: false,
        created_at: now,
        updated_at: now,
    };
    db::insert_camp(&state.db, &camp).await?;

    let message = format!(
        "New relief camp for {} starting {}",
        camp.event_type,
        camp.start_date.format("%Y-%m-%d")
    );
    let (volunteers, ngos) = notify_nearby(&state, &camp, &message).await?;
    if volunteers || ngos {
        camp.volunteers_alerted = volunteers;
        camp.ngo_alerted = ngos;
        db::save_camp(&state.db, &camp).await?;
    }

    let event = AuditEvent::new(user.actor(), "create", AuditResource::ReliefCamp)
        .resource_id(&camp.id)
        .details(format!("Created relief camp for {}", camp.event_type))
        .metadata(json!({ "demandPrediction": demand }))
        .client(&headers);
    record(&state, event, now, &[]).await;
    tracing::info!("Relief camp {} created by {}", camp.id, user.id);

    Ok((StatusCode::CREATED, AxumJson(json!({ "success": true, "camp": camp }))))
}

pub async fn list_camps(State(state): State<AppState>, _user: AuthenticatedUser) -> ApiResult<impl IntoResponse> {
    let mut camps = db::list_camps(&state.db).await?;
    camps.sort_by(|a, b| b.start_date.cmp(&a.start_date).then_with(|| a.id.cmp(&b.id)));
    Ok(AxumJson(json!({ "success": true, "camps": camps })))
}

pub async fn get_camp(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let camp = db::get_camp(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Relief camp not found"))?;
    Ok(AxumJson(json!({ "success": true, "camp": camp })))
}

/// Only these fields may change after creation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampRequest {
    pub event_type: Option<EventType>,
    pub start_date: Option<DateTime<Utc>>,
    pub resources_needed: Option<Vec<String>>,
    pub demand_prediction: Option<f64>,
}

pub async fn update_camp(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateCampRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut camp = db::get_camp(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Relief camp not found"))?;

    let mut changed = Vec::new();
    if let Some(event_type) = req.event_type {
        camp.event_type = event_type;
        changed.push("eventType");
    }
    if let Some(start) = req.start_date {
        camp.start_date = start;
        changed.push("startDate");
    }
    if let Some(resources) = req.resources_needed {
        camp.resources_needed = resources;
        changed.push("resourcesNeeded");
    }
    if let Some(demand) = req.demand_prediction {
        if !demand.is_finite() || demand < 0.0 {
            return Err(ApiError::bad_request("demandPrediction must be a non-negative number"));
        }
        camp.demand_prediction = demand;
        changed.push("demandPrediction");
    }

    let now = Utc::now();
    camp.updated_at = now;
    if !db::save_camp(&state.db, &camp).await? {
        return Err(ApiError::not_found("Relief camp not found"));
    }

    let event = AuditEvent::new(user.actor(), "update", AuditResource::ReliefCamp)
        .resource_id(&id)
        .details(format!("Updated relief camp fields: {}", changed.join(", ")))
        .metadata(json!({ "fields": changed }))
        .client(&headers);
    record(&state, event, now, &[]).await;

    Ok(AxumJson(json!({ "success": true, "camp": camp })))
}

pub async fn delete_camp(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if !db::delete_camp(&state.db, &id).await? {
        return Err(ApiError::not_found("Relief camp not found"));
    }
    let now = Utc::now();
    let event = AuditEvent::new(user.actor(), "delete", AuditResource::ReliefCamp)
        .resource_id(&id)
        .severity(Severity::Warning)
        .details(format!("Deleted relief camp {}", id))
        .client(&headers);
    record(&state, event, now, &[]).await;
    tracing::info!("Relief camp {} deleted by {}", id, user.id);

    Ok(AxumJson(json!({ "success": true, "message": "Relief camp deleted" })))
}

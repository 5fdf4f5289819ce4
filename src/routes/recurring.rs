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
use crate::db::{self, models::{AuditResource, Frequency, RecurringReminder, Storage}};
use crate::error::{ApiError, ApiResult};
use crate::routes::record;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub food_type: String,
    pub weight: String,
    pub frequency: Frequency,
    pub storage: Storage,
    pub start_date: DateTime<Utc>,
}

fn required(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

pub async fn create_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateReminderRequest>,
) -> ApiResult<impl IntoResponse> {
    let food_type = required(&req.food_type, "foodType")?;
    let weight = required(&req.weight, "weight")?;
    let predicted = state.ml.predict_category(&food_type, req.storage).await;

    let now = Utc::now();
    let reminder = RecurringReminder {
        id: format!("rec_{}", Uuid::new_v4().simple()),
        donor_id: user.id.clone(),
        food_type,
        weight,
        frequency: req.frequency,
        storage: req.storage,
        start_date: req.start_date,
        next_scheduled: req.start_date,
        predicted_category: Some(predicted),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db::insert_reminder(&state.db, &reminder).await?;

    let event = AuditEvent::new(user.actor(), "create", AuditResource::Reminder)
        .resource_id(&reminder.id)
        .details(format!("Set up {} recurring donation of {}", reminder.frequency, reminder.food_type))
        .client(&headers);
    record(&state, event, now, &[]).await;
    tracing::info!("Recurring reminder {} created for {}", reminder.id, user.id);

    Ok((StatusCode::CREATED, AxumJson(json!({ "success": true, "recurring": reminder }))))
}

pub async fn list_reminders(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult<impl IntoResponse> {
    let reminders = db::list_reminders_for_donor(&state.db, &user.id).await?;
    Ok(AxumJson(json!({ "success": true, "recurs": reminders })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderRequest {
    pub food_type: Option<String>,
    pub weight: Option<String>,
    pub frequency: Option<Frequency>,
    pub storage: Option<Storage>,
    pub start_date: Option<DateTime<Utc>>,
}

async fn owned(state: &AppState, user: &AuthenticatedUser, id: &str) -> ApiResult<RecurringReminder> {
    db::get_reminder_for_donor(&state.db, &user.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))
}

pub async fn update_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateReminderRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut reminder = owned(&state, &user, &id).await?;

    let mut repredict = false;
    if let Some(food) = req.food_type.as_deref() {
        reminder.food_type = required(food, "foodType")?;
        repredict = true;
    }
    if let Some(weight) = req.weight.as_deref() {
        reminder.weight = required(weight, "weight")?;
    }
    if let Some(frequency) = req.frequency {
        reminder.frequency = frequency;
    }
    if let Some(storage) = req.storage {
        reminder.storage = storage;
        repredict = true;
    }
    if let Some(start) = req.start_date {
        reminder.start_date = start;
    }
    if repredict {
        reminder.predicted_category = Some(state.ml.predict_category(&reminder.food_type, reminder.storage).await);
    }

    let now = Utc::now();
    reminder.next_scheduled = reminder.start_date;
    reminder.updated_at = now;
    if !db::save_reminder(&state.db, &reminder).await? {
        return Err(ApiError::not_found("Reminder not found"));
    }

    let event = AuditEvent::new(user.actor(), "update", AuditResource::Reminder)
        .resource_id(&id)
        .details(format!("Updated recurring donation of {}", reminder.food_type))
        .client(&headers);
    record(&state, event, now, &[]).await;

    Ok(AxumJson(json!({ "success": true, "updated": reminder })))
}

pub async fn deactivate_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let mut reminder = owned(&state, &user, &id).await?;
    let now = Utc::now();
    reminder.is_active = false;
    reminder.updated_at = now;
    db::save_reminder(&state.db, &reminder).await?;

    let event = AuditEvent::new(user.actor(), "delete", AuditResource::Reminder)
        .resource_id(&id)
        .details("Deactivated recurring donation")
        .client(&headers);
    record(&state, event, now, &[]).await;
    tracing::info!("Recurring reminder {} deactivated by {}", id, user.id);

    Ok(AxumJson(json!({ "success": true, "message": "Reminder deactivated" })))
}

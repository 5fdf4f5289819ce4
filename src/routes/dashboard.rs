use axum::{extract::State, http::Uri, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::analytics;
use crate::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::routes::{cached, DASHBOARD};
use crate::AppState;

pub async fn stats(State(state): State<AppState>, _admin: AdminUser, uri: Uri) -> ApiResult<impl IntoResponse> {
    cached(&state, DASHBOARD, &uri, async {
        let users = db::list_users(&state.db).await?;
        let donations = db::list_donations(&state.db).await?;
        let distributions = db::list_distributions(&state.db).await?;
        Ok::<_, ApiError>(analytics::dashboard_stats(&users, &donations, &distributions))
    })
    .await
}

pub async fn alerts(State(state): State<AppState>, _admin: AdminUser, uri: Uri) -> ApiResult<impl IntoResponse> {
    cached(&state, DASHBOARD, &uri, async {
        let audit = db::list_audit_logs(&state.db, None).await?;
        let users = db::list_users(&state.db).await?;
        let donations = db::list_donations(&state.db).await?;
        let alerts = analytics::dashboard_alerts(&audit, &users, &donations, Utc::now());
        Ok::<_, ApiError>(json!({ "alerts": alerts }))
    })
    .await
}

pub async fn recent_donations(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
) -> ApiResult<impl IntoResponse> {
    cached(&state, DASHBOARD, &uri, async {
        let donations = db::list_donations(&state.db).await?;
        let recent = analytics::recent_donations(&donations, Utc::now());
        Ok::<_, ApiError>(json!({ "recentDonations": recent }))
    })
    .await
}

pub async fn upcoming_distributions(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
) -> ApiResult<impl IntoResponse> {
    cached(&state, DASHBOARD, &uri, async {
        let distributions = db::list_distributions(&state.db).await?;
        let upcoming = analytics::upcoming_distributions(&distributions);
        Ok::<_, ApiError>(json!({ "upcomingDistributions": upcoming }))
    })
    .await
}

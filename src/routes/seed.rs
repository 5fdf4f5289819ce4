use axum::{
    extract::State,
    response::{IntoResponse, Json as AxumJson},
};
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::fixtures;
use crate::error::ApiResult;
use crate::routes::{ANALYTICS, AUDIT_LOGS, DASHBOARD, DISTRIBUTIONS, DONATIONS, USERS};
use crate::AppState;

pub async fn seed(State(state): State<AppState>, admin: AdminUser) -> ApiResult<impl IntoResponse> {
    let seeded = fixtures::seed(&state.db).await?;
    if seeded {
        state
            .cache
            .invalidate(&[USERS, DONATIONS, AUDIT_LOGS, ANALYTICS, DASHBOARD, DISTRIBUTIONS]);
        tracing::info!("Sample data loaded by {}", admin.id);
    }
    let message = if seeded {
        "Sample data loaded"
    } else {
        "Store already contains data; nothing loaded"
    };
    Ok(AxumJson(json!({ "seeded": seeded, "message": message })))
}

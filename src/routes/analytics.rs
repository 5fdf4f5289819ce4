use axum::{
    extract::{Query, State},
    http::Uri,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::analytics;
use crate::audit::Timeframe;
use crate::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::routes::{cached, ANALYTICS};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TimeframeQuery {
    pub timeframe: Option<String>,
}

impl TimeframeQuery {
    fn timeframe(&self) -> Timeframe {
        Timeframe::parse_or_default(self.timeframe.as_deref())
    }
}

pub async fn overview(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<TimeframeQuery>,
) -> ApiResult<impl IntoResponse> {
    cached(&state, ANALYTICS, &uri, async {
        let users = db::list_users(&state.db).await?;
        let donations = db::list_donations(&state.db).await?;
        let now = state.config.local_now();
        Ok::<_, ApiError>(analytics::overview(&users, &donations, query.timeframe(), &now))
    })
    .await
}

pub async fn donations(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<TimeframeQuery>,
) -> ApiResult<impl IntoResponse> {
    cached(&state, ANALYTICS, &uri, async {
        let donations = db::list_donations(&state.db).await?;
        let now = state.config.local_now();
        Ok::<_, ApiError>(analytics::donation_stats(&donations, query.timeframe(), &now))
    })
    .await
}

pub async fn users(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(query): Query<TimeframeQuery>,
) -> ApiResult<impl IntoResponse> {
    cached(&state, ANALYTICS, &uri, async {
        let users = db::list_users(&state.db).await?;
        let now = state.config.local_now();
        Ok::<_, ApiError>(analytics::user_stats(&users, query.timeframe(), &now))
    })
    .await
}

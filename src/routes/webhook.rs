use axum::{
    extract::{Json, State},
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;

use crate::auth::AuthenticatedUser;
use crate::chatbot::{self, Intent, WebhookRequest};
use crate::routes::{ANALYTICS, DASHBOARD, DONATIONS};
use crate::AppState;

/// Chatbot fulfillment. Always answers 200 with a reply text; signing in is
/// only needed for intents that create donations.
pub async fn fulfill(
    State(state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    Json(req): Json<WebhookRequest>,
) -> impl IntoResponse {
    let reply = chatbot::respond(&state.db, &req, caller.as_ref(), Utc::now()).await;
    if matches!(
        req.query_result.intent(),
        Some(Intent::CreateDonation | Intent::CancelDonation)
    ) {
        state.cache.invalidate(&[DONATIONS, ANALYTICS, DASHBOARD]);
    }
    AxumJson(reply)
}

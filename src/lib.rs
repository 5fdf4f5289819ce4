//! FoodLoop admin service: audit trail, user and donation moderation,
//! analytics, distributions, relief camps and recurring donations.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod chatbot;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod geo;
pub mod pagination;
pub mod recurring;
pub mod routes;

use cache::ResponseCache;
use clients::MlClient;
use config::AppConfig;
use db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
    pub cache: Arc<ResponseCache>,
    pub ml: MlClient,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, ml: MlClient) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl));
        AppState {
            db,
            config: Arc::new(config),
            cache,
            ml,
        }
    }
}

/// API routes with state applied. Transport concerns (CORS, rate limiting,
/// tracing, static files) are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    use routes::{
        analytics, audit_logs, camps, dashboard, distributions, donations, recurring, reports, seed, users, webhook,
    };

    let admin = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/verify", put(users::verify_user))
        .route("/users/{id}/flag", put(users::flag_user))
        .route("/donations", get(donations::list_donations))
        .route("/donations/export", get(reports::export_donations))
        .route("/donations/{id}/status", put(donations::update_donation_status))
        .route("/donations/{id}/flag", put(donations::flag_donation))
        .route("/audit-logs", get(audit_logs::list_audit_logs))
        .route("/audit-logs/export", get(reports::export_audit_logs))
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/donations", get(analytics::donations))
        .route("/analytics/users", get(analytics::users))
        .route("/dashboard-stats", get(dashboard::stats))
        .route("/dashboard-alerts", get(dashboard::alerts))
        .route("/recent-donations", get(dashboard::recent_donations))
        .route("/upcoming-distributions", get(dashboard::upcoming_distributions))
        .route("/distributions", get(distributions::list_distributions))
        .route("/distributions/{id}/status", put(distributions::update_status))
        .route("/distributions/{id}/donations", post(distributions::allocate_donations))
        .route("/distributions/{id}/volunteers", post(distributions::assign_volunteers))
        .route("/seed", post(seed::seed));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/admin", admin)
        .route("/api/relief-camps", get(camps::list_camps).post(camps::create_camp))
        .route(
            "/api/relief-camps/{id}",
            get(camps::get_camp).patch(camps::update_camp).delete(camps::delete_camp),
        )
        .route("/api/recurring", get(recurring::list_reminders).post(recurring::create_reminder))
        .route(
            "/api/recurring/{id}",
            put(recurring::update_reminder).delete(recurring::deactivate_reminder),
        )
        .route("/api/me", get(auth::me))
        .route("/webhook", post(webhook::fulfill))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/dev/login", post(auth::dev_login))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

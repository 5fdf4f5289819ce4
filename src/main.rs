use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::any,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foodloop_admin::{build_router, clients::MlClient, config::AppConfig, db, recurring, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "foodloop_admin=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if env::var("JWT_SECRET").map(|s| s.trim().is_empty()).unwrap_or(true) {
        anyhow::bail!("JWT_SECRET must be set");
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Starting FoodLoop admin service ({} mode, dashboard offset {})",
        config.env_mode,
        config.utc_offset
    );

    tracing::info!("Initializing database connection pool...");
    let db_pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connection pool initialized successfully");

    if config.seed_on_start && db::fixtures::seed(&db_pool).await? {
        tracing::info!("Loaded sample data into empty store");
    }

    let ml = MlClient::new(config.ml_api_url.as_deref(), config.forecast_api_url.as_deref())?;
    let state = AppState::new(db_pool, config, ml);
    let config = state.config.clone();

    tokio::spawn(recurring::scheduler(
        state.db.clone(),
        state.cache.clone(),
        config.recurring_interval,
    ));

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    let cors = {
        let mut origins = config
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        if origins.is_empty() {
            if config.is_production() {
                anyhow::bail!("ALLOWED_ORIGINS must contain at least one valid origin in production");
            }
            origins = vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ];
        }

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    };

    let static_dir = config.static_dir.clone();
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(format!("{}/index.html", static_dir)));

    let app = build_router(state)
        // Unknown API paths must not fall through to the dashboard shell.
        .route("/api/{*rest}", any(|| async { StatusCode::NOT_FOUND }))
        .fallback_service(spa)
        .layer(cors)
        .layer(GovernorLayer::new(governor_config))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

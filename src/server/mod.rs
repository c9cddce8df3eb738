//! Web server module
//!
//! The HTTP front door for the pattern memory engine. Routing and
//! transport only — every operation delegates to the engine, profile
//! service, or stats aggregator carried in [`ServerState`].

pub mod auth;
pub mod http;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::PatternEngine;
use crate::profile::ProfileService;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub engine: Arc<PatternEngine>,
    pub profiles: Arc<ProfileService>,
}

/// Build the application router: everything except the health check
/// sits behind the API-key layer.
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/predict", post(http::predict_handler))
        .route("/api/patterns/upload", post(http::upload_pattern_handler))
        .route("/api/patterns/search", get(http::search_patterns_handler))
        .route("/api/patterns/stats", get(http::pattern_stats_handler))
        .route("/api/patterns/sync", get(http::sync_patterns_handler))
        .route("/api/patterns/user/{email}", get(http::user_patterns_handler))
        .route("/api/user-data/save", post(http::save_user_data_handler))
        .route("/api/user-data/{email}", get(http::get_user_data_handler))
        .route("/api/stats/summary", get(http::stats_summary_handler))
        .route("/api/feedback/track", post(http::track_feedback_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    let public = Router::new().route("/health", get(http::health_handler));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(
    config: Arc<Config>,
    engine: Arc<PatternEngine>,
    profiles: Arc<ProfileService>,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host/port")?;

    if config.auth.api_key.as_deref().filter(|k| !k.is_empty()).is_none() {
        warn!("⚠️ API authentication is DISABLED (no auth.api_key configured)");
    }

    let state = ServerState {
        config,
        engine,
        profiles,
    };
    let app = router(state);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     FormFill Service Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    info!("listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}

//! API key authentication
//!
//! Enforces a static `X-API-Key` header on every route except the
//! health check. When no key is configured the layer lets requests
//! through — local development — and the server logs a warning at
//! startup; production deployments must set one.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::server::ServerState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state
        .config
        .auth
        .api_key
        .as_deref()
        .filter(|key| !key.is_empty())
    else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided == Some(expected) {
        next.run(request).await
    } else {
        error!(
            "unauthorized access attempt: {}",
            if provided.is_none() {
                "empty header"
            } else {
                "invalid key"
            }
        );
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Could not validate credentials - missing or invalid X-API-Key"
            })),
        )
            .into_response()
    }
}

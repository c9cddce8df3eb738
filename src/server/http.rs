//! HTTP handlers for the prediction, pattern, profile, and stats routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::server::ServerState;
use crate::store::UpsertError;
use crate::types::{Pattern, PredictRequest};

/// Upload body: the extension wraps the pattern in an object.
#[derive(Debug, Deserialize)]
pub struct PatternUploadRequest {
    pub pattern: Pattern,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    /// Accepted for forward compatibility; the full set is returned
    /// regardless.
    #[allow(dead_code)]
    pub since: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    pub email: Option<String>,
    #[serde(rename = "type", default = "default_feedback_type")]
    pub feedback_type: String,
}

fn default_feedback_type() -> String {
    "click".to_string()
}

/// `POST /predict` — pattern memory first, hosted model on a miss.
pub async fn predict_handler(
    State(state): State<ServerState>,
    Json(request): Json<PredictRequest>,
) -> impl IntoResponse {
    match state.engine.predict(&request).await {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(e) => {
            error!("prediction failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Prediction failed",
                    "details": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// `POST /api/patterns/upload?email=` — direct write path, bypassing
/// the learner's confidence gate.
pub async fn upload_pattern_handler(
    State(state): State<ServerState>,
    Query(query): Query<EmailQuery>,
    Json(request): Json<PatternUploadRequest>,
) -> impl IntoResponse {
    match state
        .engine
        .upload_pattern(request.pattern, query.email.as_deref())
        .await
    {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Pattern uploaded successfully"
        }))
        .into_response(),
        Err(e @ (UpsertError::MissingOwner | UpsertError::NoAnswerMappings)) => Json(json!({
            "success": false,
            "error": format!("Pattern rejected - {}", e)
        }))
        .into_response(),
        Err(UpsertError::Store(e)) => {
            error!("pattern upload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Pattern upload failed",
                    "details": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// `GET /api/patterns/search?q=`
pub async fn search_patterns_handler(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let Some(q) = query.q.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Query parameter 'q' is required"})),
        )
            .into_response();
    };

    let matches: Vec<Pattern> = state
        .engine
        .search_patterns(&q, query.email.as_deref())
        .await
        .map(|hit| vec![hit.pattern])
        .unwrap_or_default();

    Json(json!({
        "success": true,
        "matches": matches
    }))
    .into_response()
}

/// `GET /api/patterns/stats`
pub async fn pattern_stats_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = state.engine.pattern_stats().await;
    Json(json!({
        "success": true,
        "stats": stats
    }))
}

/// `GET /api/patterns/sync?since=`
pub async fn sync_patterns_handler(
    State(state): State<ServerState>,
    Query(_query): Query<SyncQuery>,
) -> impl IntoResponse {
    let patterns = state.engine.sync_patterns().await;
    Json(json!({
        "success": true,
        "total": patterns.len(),
        "patterns": patterns
    }))
}

/// `GET /api/patterns/user/{email}`
pub async fn user_patterns_handler(
    State(state): State<ServerState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let patterns = state.engine.user_patterns(&email).await;
    Json(json!({
        "success": true,
        "total": patterns.len(),
        "patterns": patterns
    }))
}

/// `POST /api/user-data/save`
pub async fn save_user_data_handler(
    State(state): State<ServerState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let Some(email) = payload
        .get("email")
        .and_then(Value::as_str)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Field 'email' is required"})),
        )
            .into_response();
    };

    match state.profiles.save_profile(&email, payload).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Profile saved"
        }))
        .into_response(),
        Err(e) => {
            error!("profile save failed for {}: {}", email, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to save profile",
                    "details": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// `GET /api/user-data/{email}`
pub async fn get_user_data_handler(
    State(state): State<ServerState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    match state.profiles.get_profile(&email).await {
        Some(profile) => Json(json!({
            "success": true,
            "profile": profile
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Profile not found"})),
        )
            .into_response(),
    }
}

/// `GET /api/stats/summary` — counts for the overlay panel.
pub async fn stats_summary_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let users = state.engine.stats().user_count().await;
    let feedback = state.engine.stats().feedback_count().await;
    Json(json!({
        "success": true,
        "users": users,
        "feedback": feedback
    }))
}

/// `POST /api/feedback/track?email=&type=`
pub async fn track_feedback_handler(
    State(state): State<ServerState>,
    Query(query): Query<FeedbackQuery>,
) -> impl IntoResponse {
    let Some(email) = query.email.filter(|email| !email.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Query parameter 'email' is required"})),
        )
            .into_response();
    };

    let success = state
        .profiles
        .track_feedback(&email, &query.feedback_type)
        .await;
    Json(json!({ "success": success })).into_response()
}

/// `GET /health`
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": crate::NAME,
        "version": crate::VERSION
    }))
}

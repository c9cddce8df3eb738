//! User profile service
//!
//! Thin service over the relational store for profile rows and the
//! feedback interaction log. A stored profile is a single validated
//! record: a payload that arrives double-wrapped (an object whose only
//! meaningful content sits under a `profile_data` key) is unwrapped
//! once here, at the write boundary, so reads never need to.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::store::{Filter, RelationalStore, StoreResult, FEEDBACKS, USER_PROFILES};

pub struct ProfileService {
    store: Arc<dyn RelationalStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Upsert a profile keyed on email, stamping `updated_at`.
    pub async fn save_profile(&self, email: &str, profile: Value) -> StoreResult<()> {
        let row = json!({
            "email": email,
            "profile_data": unwrap_profile_payload(profile),
            "updated_at": Utc::now().to_rfc3339(),
        });
        self.store
            .upsert(USER_PROFILES, row, Some("email"))
            .await?;
        Ok(())
    }

    /// Fetch a profile. Read path: a store failure degrades to `None`.
    pub async fn get_profile(&self, email: &str) -> Option<Value> {
        let filters = [Filter::Eq("email", email.to_string())];
        match self.store.select(USER_PROFILES, "*", &filters, false).await {
            Ok(result) => result
                .rows
                .first()
                .and_then(|row| row.get("profile_data"))
                .cloned(),
            Err(e) => {
                warn!("profile lookup for {} failed: {}", email, e);
                None
            }
        }
    }

    /// Create the least-information profile for an owner: just the
    /// email. Used only by the gateway's foreign-key self-heal.
    pub async fn create_stub_profile(&self, email: &str) -> StoreResult<()> {
        self.save_profile(email, json!({"personal": {"email": email}}))
            .await
    }

    /// Record a feedback interaction. Best effort: failures are logged
    /// and reported as `false`, never propagated.
    pub async fn track_feedback(&self, email: &str, feedback_type: &str) -> bool {
        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "email": email,
            "feedback_type": feedback_type,
            "created_at": Utc::now().to_rfc3339(),
        });
        match self.store.insert(FEEDBACKS, row).await {
            Ok(_) => true,
            Err(e) => {
                warn!("tracking feedback for {} failed: {}", email, e);
                false
            }
        }
    }
}

/// The store previously allowed `{"profile_data": {...}}` payloads to
/// be stored verbatim, double-wrapping the column. Unwrap exactly once
/// here so the stored shape is always the bare profile object.
fn unwrap_profile_payload(value: Value) -> Value {
    match value {
        Value::Object(ref map) if map.contains_key("profile_data") => map["profile_data"].clone(),
        other => other,
    }
}

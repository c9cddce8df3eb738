//! Store gateway
//!
//! Owns every pattern write and read against the relational store.
//! Private writes are idempotent: identity is a deterministic hash of
//! (owner, normalized question, intent), an existing row's id is always
//! reused, and the write is a merge-on-conflict upsert, so two
//! concurrent learns of the same question converge to one row with the
//! later write's fields winning. A missing owner profile is repaired by
//! creating a stub profile and retrying exactly once.

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::{
    Filter, RelationalStore, StoreError, StoreResult, GLOBAL_PATTERNS, LEARNED_PATTERNS,
};
use crate::engine::normalizer::normalize;
use crate::profile::ProfileService;
use crate::types::{AnswerMapping, OwnerScope, Pattern, UNKNOWN_INTENT};

/// Failures from the private upsert path. Validation variants never
/// reach the store; `Store` wraps anything the backend reported after
/// the self-heal retry was exhausted.
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("a private pattern requires an owner email")]
    MissingOwner,
    #[error("pattern has no answer mappings")]
    NoAnswerMappings,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deterministic private-pattern identity: `pattern_` plus the first
/// 12 hex chars of SHA-256 over `owner:question:intent`. Repeated
/// learning of the same triple always lands on the same id.
pub fn deterministic_pattern_id(owner: &str, normalized_question: &str, intent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_bytes());
    hasher.update(b":");
    hasher.update(normalized_question.as_bytes());
    hasher.update(b":");
    hasher.update(intent.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("pattern_{}", &digest[..12])
}

pub struct StoreGateway {
    store: Arc<dyn RelationalStore>,
    profiles: Arc<ProfileService>,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn RelationalStore>, profiles: Arc<ProfileService>) -> Self {
        Self { store, profiles }
    }

    /// Idempotent private write. See the module docs for the identity
    /// and self-heal contract.
    pub async fn upsert_private_pattern(
        &self,
        owner_email: Option<&str>,
        pattern: &Pattern,
    ) -> Result<(), UpsertError> {
        let owner = owner_email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or(UpsertError::MissingOwner)?;
        if pattern.answer_mappings.is_empty() {
            return Err(UpsertError::NoAnswerMappings);
        }

        let normalized = normalize(&pattern.question_pattern);
        let intent = if pattern.intent.trim().is_empty() {
            UNKNOWN_INTENT
        } else {
            pattern.intent.as_str()
        };

        // Never mint a second id for the same owner+question: an
        // existing row keeps its identity even if the intent changed.
        let existing = self
            .store
            .select(
                LEARNED_PATTERNS,
                "id",
                &[
                    Filter::Eq("user_email", owner.to_string()),
                    Filter::Eq("question_pattern", normalized.clone()),
                ],
                false,
            )
            .await
            .map_err(UpsertError::Store)?;

        let existing_id = existing
            .rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_update = existing_id.is_some();
        let id =
            existing_id.unwrap_or_else(|| deterministic_pattern_id(owner, &normalized, intent));

        let row = json!({
            "id": id,
            "user_email": owner,
            "question_pattern": normalized,
            "intent": intent,
            "canonical_key": pattern.canonical_key,
            "field_type": pattern.field_type,
            "confidence": pattern.confidence,
            "answer_mappings": pattern.answer_mappings,
            "source": pattern.source,
            "last_used": Utc::now().to_rfc3339(),
            "created_at": pattern.created_at.to_rfc3339(),
        });

        let result = if is_update {
            info!("pattern exists, updating: {}", id);
            self.store
                .upsert(LEARNED_PATTERNS, row.clone(), Some("id"))
                .await
        } else {
            info!("creating new pattern: {}", id);
            self.store.insert(LEARNED_PATTERNS, row.clone()).await
        };

        match result {
            Ok(_) => Ok(()),
            Err(StoreError::ForeignKey(reason)) => {
                // The owner has no profile row yet. Create the minimal
                // stub and retry the write exactly once; a second
                // failure surfaces.
                warn!(
                    "owner {} missing from profiles ({}), creating stub and retrying",
                    owner, reason
                );
                if let Err(e) = self.profiles.create_stub_profile(owner).await {
                    warn!("stub profile creation failed for {}: {}", owner, e);
                }
                self.store
                    .upsert(LEARNED_PATTERNS, row, Some("id"))
                    .await
                    .map_err(UpsertError::Store)?;
                Ok(())
            }
            Err(e) => Err(UpsertError::Store(e)),
        }
    }

    /// Exact-match lookup in one owner's private patterns. The text
    /// must already be normalized; stored rows are compared through the
    /// same normalization so legacy casing cannot cause a miss.
    pub async fn search_private_by_text(
        &self,
        owner_email: &str,
        normalized_text: &str,
    ) -> StoreResult<Option<Pattern>> {
        let result = self
            .store
            .select(
                LEARNED_PATTERNS,
                "*",
                &[Filter::Eq("user_email", owner_email.to_string())],
                false,
            )
            .await?;

        Ok(result.rows.iter().find_map(|row| {
            let question = row.get("question_pattern").and_then(Value::as_str)?;
            if normalize(question) != normalized_text {
                return None;
            }
            pattern_from_row(row, OwnerScope::Private(owner_email.to_string()))
        }))
    }

    /// The whole shared pattern set. Read path: a store failure
    /// degrades to an empty set so matching stays available.
    pub async fn read_all_global_patterns(&self) -> Vec<Pattern> {
        match self.store.select(GLOBAL_PATTERNS, "*", &[], false).await {
            Ok(result) => parse_rows(&result.rows, || OwnerScope::Global),
            Err(e) => {
                warn!("reading global patterns failed: {}", e);
                Vec::new()
            }
        }
    }

    /// All learned patterns for one user. Degrades to empty.
    pub async fn user_patterns(&self, email: &str) -> Vec<Pattern> {
        let filters = [Filter::Eq("user_email", email.to_string())];
        match self.store.select(LEARNED_PATTERNS, "*", &filters, false).await {
            Ok(result) => parse_rows(&result.rows, || OwnerScope::Private(email.to_string())),
            Err(e) => {
                warn!("reading patterns for {} failed: {}", email, e);
                Vec::new()
            }
        }
    }
}

fn parse_rows(rows: &[Value], scope: impl Fn() -> OwnerScope) -> Vec<Pattern> {
    rows.iter()
        .filter_map(|row| {
            let pattern = pattern_from_row(row, scope());
            if pattern.is_none() {
                warn!("skipping malformed pattern row: {}", row);
            }
            pattern
        })
        .collect()
}

fn pattern_from_row(row: &Value, owner_scope: OwnerScope) -> Option<Pattern> {
    let parse_time = |column: &str| {
        row.get(column)
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    };

    let answer_mappings: Vec<AnswerMapping> = row
        .get("answer_mappings")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .ok()?
        .unwrap_or_default();

    let intent = row
        .get("intent")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_INTENT);

    Some(Pattern {
        id: row.get("id").and_then(Value::as_str)?.to_string(),
        owner_scope,
        question_pattern: row.get("question_pattern").and_then(Value::as_str)?.to_string(),
        intent: intent.to_string(),
        canonical_key: row
            .get("canonical_key")
            .and_then(Value::as_str)
            .map(str::to_string),
        field_type: row
            .get("field_type")
            .and_then(Value::as_str)
            .map(str::to_string),
        confidence: row
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(1.0),
        answer_mappings,
        source: row
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("AI")
            .to_string(),
        created_at: parse_time("created_at"),
        last_used: parse_time("last_used"),
    })
}

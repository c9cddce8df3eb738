//! Shared types used across modules
//!
//! This module contains the pattern data model and wire types that are
//! used by multiple modules to avoid circular dependencies. Wire field
//! names are camelCase because that is what the extension speaks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Intent sentinel used whenever an upstream source fails to supply one.
/// Valid but low-value; never stored or returned as an empty string.
pub const UNKNOWN_INTENT: &str = "unknown";

/// One canonical answer plus its accepted variants for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMapping {
    pub canonical_value: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub context_options: Vec<String>,
}

impl AnswerMapping {
    /// Seed a mapping from a freshly predicted answer.
    pub fn seeded(answer: &str, context_options: &[String]) -> Self {
        Self {
            canonical_value: answer.to_string(),
            variants: vec![answer.to_string()],
            context_options: context_options.to_vec(),
        }
    }
}

/// Who a pattern belongs to. Private patterns are keyed to one user and
/// always win over global ones during matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    Private(String),
    Global,
}

impl Default for OwnerScope {
    fn default() -> Self {
        OwnerScope::Global
    }
}

/// A learned question→answer association.
///
/// `question_pattern` is stored normalized (lowercase, trimmed) so
/// identity and matching never diverge on casing or whitespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Deterministic `pattern_<hash>` for private patterns,
    /// store-assigned for global ones. May be empty on an inbound
    /// upload; the gateway always computes or reuses the identity.
    #[serde(default)]
    pub id: String,
    /// Internal only, never on the wire; set by whoever loads the row.
    #[serde(skip)]
    pub owner_scope: OwnerScope,
    pub question_pattern: String,
    pub intent: String,
    #[serde(default)]
    pub canonical_key: Option<String>,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub answer_mappings: Vec<AnswerMapping>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_used: DateTime<Utc>,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_source() -> String {
    "AI".to_string()
}

impl Pattern {
    /// The answer a match resolves to: the first mapping's first
    /// variant, or its canonical value when there are no variants.
    /// Returns `None` when that resolves to an empty string, so callers
    /// fall through to a fresh prediction instead of filling "".
    pub fn primary_answer(&self) -> Option<&str> {
        let mapping = self.answer_mappings.first()?;
        let answer = mapping
            .variants
            .first()
            .map(String::as_str)
            .unwrap_or(mapping.canonical_value.as_str());
        if answer.is_empty() {
            None
        } else {
            Some(answer)
        }
    }
}

/// Inbound prediction request from the extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub question: String,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_profile: Option<Value>,
}

/// A prediction answer, from pattern memory or the hosted model.
/// `intent` is never empty; callers substitute [`UNKNOWN_INTENT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub answer: String,
    pub confidence: f64,
    pub intent: String,
    pub reasoning: String,
}

/// Global pattern counts for the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_global_patterns: u64,
    pub intent_breakdown: BTreeMap<String, u64>,
}

/// Total plus trailing-24h count for users or feedback rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyCount {
    pub total: u64,
    pub recent_24h: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_answer_prefers_first_variant() {
        let pattern = Pattern {
            id: "pattern_abc".into(),
            owner_scope: OwnerScope::Global,
            question_pattern: "what is your gender?".into(),
            intent: "eeo.gender".into(),
            canonical_key: None,
            field_type: Some("radio".into()),
            confidence: 0.9,
            answer_mappings: vec![AnswerMapping {
                canonical_value: "Male".into(),
                variants: vec!["M".into(), "Male".into()],
                context_options: vec![],
            }],
            source: "AI".into(),
            created_at: Utc::now(),
            last_used: Utc::now(),
        };
        assert_eq!(pattern.primary_answer(), Some("M"));
    }

    #[test]
    fn primary_answer_falls_back_to_canonical_value() {
        let mut pattern = sample();
        pattern.answer_mappings[0].variants.clear();
        assert_eq!(pattern.primary_answer(), Some("Blue"));
    }

    #[test]
    fn primary_answer_is_none_for_empty_strings() {
        let mut pattern = sample();
        pattern.answer_mappings[0].variants = vec![String::new()];
        assert_eq!(pattern.primary_answer(), None);

        pattern.answer_mappings.clear();
        assert_eq!(pattern.primary_answer(), None);
    }

    #[test]
    fn pattern_deserializes_from_extension_wire_shape() {
        let pattern: Pattern = serde_json::from_str(
            r#"{
                "questionPattern": "What is your favorite color?",
                "intent": "personal.favoriteColor",
                "fieldType": "text",
                "confidence": 0.95,
                "source": "AI",
                "answerMappings": [
                    {"canonicalValue": "Blue", "variants": ["Blue", "Light Blue"]}
                ]
            }"#,
        )
        .unwrap();

        assert!(pattern.id.is_empty());
        assert_eq!(pattern.owner_scope, OwnerScope::Global);
        assert_eq!(pattern.answer_mappings[0].canonical_value, "Blue");
        assert!(pattern.answer_mappings[0].context_options.is_empty());
    }

    fn sample() -> Pattern {
        Pattern {
            id: "pattern_abc".into(),
            owner_scope: OwnerScope::Global,
            question_pattern: "what is your favorite color?".into(),
            intent: "personal.favoriteColor".into(),
            canonical_key: None,
            field_type: None,
            confidence: 0.9,
            answer_mappings: vec![AnswerMapping {
                canonical_value: "Blue".into(),
                variants: vec!["Blue".into()],
                context_options: vec![],
            }],
            source: "AI".into(),
            created_at: Utc::now(),
            last_used: Utc::now(),
        }
    }
}

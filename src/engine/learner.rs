//! Learning policy
//!
//! Decides whether a fresh model answer is worth remembering and
//! builds the pattern record to persist. The gate is deliberately
//! simple: a non-empty answer at or above the configured confidence
//! threshold. The built pattern carries exactly one answer mapping
//! seeded from the prediction.

use chrono::Utc;

use super::normalizer::normalize;
use crate::types::{AnswerMapping, OwnerScope, Pattern, UNKNOWN_INTENT};

pub struct Learner {
    learn_threshold: f64,
}

impl Learner {
    pub fn new(learn_threshold: f64) -> Self {
        Self { learn_threshold }
    }

    /// Remember only answers that are non-empty and confident enough.
    pub fn should_learn(&self, answer: &str, confidence: f64) -> bool {
        !answer.trim().is_empty() && confidence >= self.learn_threshold
    }

    /// Build the record to persist for a confident fresh prediction.
    /// The id is left empty — the gateway owns identity.
    pub fn build_pattern(
        &self,
        question: &str,
        answer: &str,
        intent: &str,
        field_type: Option<&str>,
        confidence: f64,
        context_options: &[String],
    ) -> Pattern {
        let intent = if intent.trim().is_empty() {
            UNKNOWN_INTENT
        } else {
            intent
        };
        let now = Utc::now();
        Pattern {
            id: String::new(),
            owner_scope: OwnerScope::Global,
            question_pattern: normalize(question),
            intent: intent.to_string(),
            canonical_key: None,
            field_type: field_type.map(str::to_string),
            confidence,
            answer_mappings: vec![AnswerMapping::seeded(answer, context_options)],
            source: "AI".to_string(),
            created_at: now,
            last_used: now,
        }
    }
}

//! Pattern memory engine
//!
//! The orchestrating facade behind the HTTP front door: normalize and
//! match first, fall back to the hosted model on a miss, and remember
//! confident fresh answers through the store gateway. The engine holds
//! no mutable state across requests — dedup correctness lives in the
//! gateway's idempotent upsert, not in any in-process lock.

pub mod learner;
pub mod matcher;
pub mod normalizer;
pub mod stats;

pub use learner::Learner;
pub use matcher::{MatchResult, MatchTier, Matcher};
pub use normalizer::normalize;
pub use stats::StatsAggregator;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::predict::PredictionService;
use crate::store::{StoreGateway, UpsertError};
use crate::types::{GlobalStats, Pattern, PredictRequest, Prediction, UNKNOWN_INTENT};

/// Reasoning string for answers served from memory. The extension
/// keys on it to distinguish memory hits from fresh model calls.
pub const PATTERN_MEMORY_REASONING: &str = "Retrieved from Pattern Memory";

pub struct PatternEngine {
    matcher: Matcher,
    learner: Learner,
    gateway: Arc<StoreGateway>,
    stats: Arc<StatsAggregator>,
    prediction: Arc<dyn PredictionService>,
    config: EngineConfig,
}

impl PatternEngine {
    pub fn new(
        config: EngineConfig,
        gateway: Arc<StoreGateway>,
        stats: Arc<StatsAggregator>,
        prediction: Arc<dyn PredictionService>,
    ) -> Self {
        Self {
            matcher: Matcher::new(gateway.clone(), config.fuzzy_match_threshold),
            learner: Learner::new(config.learn_threshold),
            gateway,
            stats,
            prediction,
            config,
        }
    }

    /// The full prediction flow: pattern memory, then the hosted
    /// model, then a best-effort learn of the fresh answer.
    pub async fn predict(&self, request: &PredictRequest) -> Result<Prediction> {
        if let Some(hit) = self
            .matcher
            .search(&request.question, request.user_email.as_deref())
            .await
        {
            // A hit that resolves to an empty answer falls through to
            // the model instead of filling "".
            if let Some(answer) = hit.pattern.primary_answer() {
                debug!("answering from pattern memory ({:?})", hit.tier);
                return Ok(Prediction {
                    answer: answer.to_string(),
                    confidence: self.config.pattern_memory_confidence,
                    intent: hit.pattern.intent.clone(),
                    reasoning: PATTERN_MEMORY_REASONING.to_string(),
                });
            }
        }

        let mut prediction = self.prediction.predict(request).await?;
        if prediction.intent.trim().is_empty() {
            prediction.intent = UNKNOWN_INTENT.to_string();
        }

        if self
            .learner
            .should_learn(&prediction.answer, prediction.confidence)
        {
            let pattern = self.learner.build_pattern(
                &request.question,
                &prediction.answer,
                &prediction.intent,
                request.field_type.as_deref(),
                prediction.confidence,
                &request.options,
            );
            // Best effort: the user still gets the answer even when
            // the write-back fails.
            if let Err(e) = self
                .gateway
                .upsert_private_pattern(request.user_email.as_deref(), &pattern)
                .await
            {
                warn!("pattern write-back failed: {}", e);
            }
        }

        Ok(prediction)
    }

    /// Direct write path, bypassing the learner's confidence gate.
    pub async fn upload_pattern(
        &self,
        pattern: Pattern,
        owner_email: Option<&str>,
    ) -> Result<(), UpsertError> {
        self.gateway
            .upsert_private_pattern(owner_email, &pattern)
            .await
    }

    pub async fn search_patterns(
        &self,
        question: &str,
        owner_email: Option<&str>,
    ) -> Option<MatchResult> {
        self.matcher.search(question, owner_email).await
    }

    pub async fn pattern_stats(&self) -> GlobalStats {
        self.stats.global_stats().await
    }

    /// All global patterns, for the extension's sync pull.
    pub async fn sync_patterns(&self) -> Vec<Pattern> {
        self.gateway.read_all_global_patterns().await
    }

    pub async fn user_patterns(&self, email: &str) -> Vec<Pattern> {
        self.gateway.user_patterns(email).await
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::MockPredictionService;
    use crate::profile::ProfileService;
    use crate::store::{MemoryStore, RelationalStore, LEARNED_PATTERNS};

    fn engine_with(
        prediction: MockPredictionService,
    ) -> (Arc<MemoryStore>, PatternEngine) {
        let store = Arc::new(MemoryStore::new());
        let profiles = Arc::new(ProfileService::new(store.clone()));
        let gateway = Arc::new(StoreGateway::new(store.clone(), profiles));
        let stats = Arc::new(StatsAggregator::new(store.clone()));
        let engine = PatternEngine::new(
            EngineConfig::default(),
            gateway,
            stats,
            Arc::new(prediction),
        );
        (store, engine)
    }

    fn request(question: &str, email: Option<&str>) -> PredictRequest {
        PredictRequest {
            question: question.to_string(),
            field_type: Some("text".to_string()),
            options: vec![],
            user_email: email.map(str::to_string),
            user_profile: None,
        }
    }

    fn canned(answer: &str, confidence: f64, intent: &str) -> Prediction {
        Prediction {
            answer: answer.to_string(),
            confidence,
            intent: intent.to_string(),
            reasoning: "Model prediction".to_string(),
        }
    }

    #[tokio::test]
    async fn confident_answer_triggers_exactly_one_write() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(1)
            .returning(|_| Ok(canned("Blue", 0.70, "personal.favoriteColor")));
        let (store, engine) = engine_with(prediction);

        let result = engine
            .predict(&request("What is your favorite color?", Some("a@x.com")))
            .await
            .unwrap();
        assert_eq!(result.answer, "Blue");

        let rows = store
            .select(LEARNED_PATTERNS, "*", &[], false)
            .await
            .unwrap();
        assert_eq!(rows.rows.len(), 1);
    }

    #[tokio::test]
    async fn low_confidence_and_empty_answers_are_never_learned() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(2)
            .returning(|request| {
                if request.question.contains("color") {
                    Ok(canned("Blue", 0.69, "personal.favoriteColor"))
                } else {
                    Ok(canned("", 0.70, "personal.firstName"))
                }
            });
        let (store, engine) = engine_with(prediction);

        engine
            .predict(&request("What is your favorite color?", Some("a@x.com")))
            .await
            .unwrap();
        engine
            .predict(&request("What is your first name?", Some("a@x.com")))
            .await
            .unwrap();

        let rows = store
            .select(LEARNED_PATTERNS, "*", &[], false)
            .await
            .unwrap();
        assert!(rows.rows.is_empty());
    }

    #[tokio::test]
    async fn second_ask_is_served_from_memory() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(1)
            .returning(|_| Ok(canned("Blue", 0.9, "personal.favoriteColor")));
        let (_store, engine) = engine_with(prediction);

        let first = engine
            .predict(&request("What is your favorite color?", Some("a@x.com")))
            .await
            .unwrap();
        assert_eq!(first.reasoning, "Model prediction");

        // Same question again: memory answers, the mock's times(1)
        // proves the model is not called twice.
        let second = engine
            .predict(&request("what is your FAVORITE color?  ", Some("a@x.com")))
            .await
            .unwrap();
        assert_eq!(second.answer, "Blue");
        assert_eq!(second.reasoning, PATTERN_MEMORY_REASONING);
        assert_eq!(second.confidence, 0.95);
        assert_eq!(second.intent, "personal.favoriteColor");
    }

    #[tokio::test]
    async fn empty_model_intent_is_replaced_with_unknown() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(1)
            .returning(|_| Ok(canned("Blue", 0.9, "")));
        let (_store, engine) = engine_with(prediction);

        let result = engine
            .predict(&request("What is your favorite color?", None))
            .await
            .unwrap();
        assert_eq!(result.intent, UNKNOWN_INTENT);
    }

    #[tokio::test]
    async fn missing_owner_write_back_does_not_fail_the_response() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(1)
            .returning(|_| Ok(canned("Blue", 0.9, "personal.favoriteColor")));
        let (store, engine) = engine_with(prediction);

        // No user email: the learn is skipped by the gateway, but the
        // answer still flows back.
        let result = engine
            .predict(&request("What is your favorite color?", None))
            .await
            .unwrap();
        assert_eq!(result.answer, "Blue");

        let rows = store
            .select(LEARNED_PATTERNS, "*", &[], false)
            .await
            .unwrap();
        assert!(rows.rows.is_empty());
    }

    #[tokio::test]
    async fn model_failure_propagates_when_memory_misses() {
        let mut prediction = MockPredictionService::new();
        prediction
            .expect_predict()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("model timed out")));
        let (_store, engine) = engine_with(prediction);

        let result = engine.predict(&request("Unseen question?", None)).await;
        assert!(result.is_err());
    }
}

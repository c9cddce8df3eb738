//! End-to-end engine flow against the in-memory store backend

use async_trait::async_trait;
use std::sync::Arc;

use formfill::config::EngineConfig;
use formfill::engine::PATTERN_MEMORY_REASONING;
use formfill::store::{LEARNED_PATTERNS, USER_PROFILES};
use formfill::{
    AnswerMapping, MatchTier, MemoryStore, OwnerScope, Pattern, PatternEngine, PredictRequest,
    Prediction, PredictionService, ProfileService, RelationalStore, StatsAggregator, StoreGateway,
};

/// Prediction service that always returns the same canned answer.
struct Canned(Prediction);

#[async_trait]
impl PredictionService for Canned {
    async fn predict(&self, _request: &PredictRequest) -> anyhow::Result<Prediction> {
        Ok(self.0.clone())
    }
}

fn harness(canned: Prediction) -> (Arc<MemoryStore>, PatternEngine) {
    let store = Arc::new(MemoryStore::new());
    let profiles = Arc::new(ProfileService::new(store.clone()));
    let gateway = Arc::new(StoreGateway::new(store.clone(), profiles));
    let stats = Arc::new(StatsAggregator::new(store.clone()));
    let engine = PatternEngine::new(
        EngineConfig::default(),
        gateway,
        stats,
        Arc::new(Canned(canned)),
    );
    (store, engine)
}

fn gender_pattern() -> Pattern {
    Pattern {
        id: String::new(),
        owner_scope: OwnerScope::Global,
        question_pattern: "What is your gender?".to_string(),
        intent: "eeo.gender".to_string(),
        canonical_key: None,
        field_type: Some("radio".to_string()),
        confidence: 0.95,
        answer_mappings: vec![AnswerMapping::seeded("Male", &[])],
        source: "manual".to_string(),
        created_at: chrono::Utc::now(),
        last_used: chrono::Utc::now(),
    }
}

fn model_answer(answer: &str, confidence: f64, intent: &str) -> Prediction {
    Prediction {
        answer: answer.to_string(),
        confidence,
        intent: intent.to_string(),
        reasoning: "Model prediction".to_string(),
    }
}

#[tokio::test]
async fn uploaded_pattern_answers_the_owners_search() {
    let (_store, engine) = harness(model_answer("should not be used", 0.0, "unknown"));

    engine
        .upload_pattern(gender_pattern(), Some("a@x.com"))
        .await
        .unwrap();

    let hit = engine
        .search_patterns("what is your gender?", Some("a@x.com"))
        .await
        .expect("uploaded pattern should match");
    assert_eq!(hit.tier, MatchTier::PrivateExact);
    assert_eq!(hit.pattern.primary_answer(), Some("Male"));
    assert_eq!(hit.pattern.intent, "eeo.gender");
}

#[tokio::test]
async fn upload_self_heals_the_missing_profile() {
    let (store, engine) = harness(model_answer("unused", 0.0, "unknown"));

    // No profile row exists for the owner; the write must repair the
    // missing reference instead of failing.
    engine
        .upload_pattern(gender_pattern(), Some("fresh@x.com"))
        .await
        .unwrap();

    let profiles = store.select(USER_PROFILES, "*", &[], false).await.unwrap();
    assert_eq!(profiles.rows.len(), 1);
    assert_eq!(profiles.rows[0]["email"].as_str(), Some("fresh@x.com"));
}

#[tokio::test]
async fn predicting_learns_then_reuses_the_learned_answer() {
    let (store, engine) = harness(model_answer("Blue", 0.9, "personal.favoriteColor"));

    let request = PredictRequest {
        question: "What is your favorite color?".to_string(),
        field_type: Some("text".to_string()),
        options: vec![],
        user_email: Some("a@x.com".to_string()),
        user_profile: None,
    };

    let first = engine.predict(&request).await.unwrap();
    assert_eq!(first.answer, "Blue");
    assert_eq!(first.reasoning, "Model prediction");

    let second = engine.predict(&request).await.unwrap();
    assert_eq!(second.answer, "Blue");
    assert_eq!(second.reasoning, PATTERN_MEMORY_REASONING);
    assert_eq!(second.confidence, 0.95);

    // Both asks converged on a single stored row.
    let rows = store
        .select(LEARNED_PATTERNS, "*", &[], false)
        .await
        .unwrap();
    assert_eq!(rows.rows.len(), 1);
}

#[tokio::test]
async fn upload_without_owner_is_rejected_and_writes_nothing() {
    let (store, engine) = harness(model_answer("unused", 0.0, "unknown"));

    let result = engine.upload_pattern(gender_pattern(), None).await;
    assert!(result.is_err());

    let rows = store
        .select(LEARNED_PATTERNS, "*", &[], false)
        .await
        .unwrap();
    assert!(rows.rows.is_empty());
}

#[tokio::test]
async fn learned_patterns_show_up_in_the_user_listing() {
    let (_store, engine) = harness(model_answer("Blue", 0.9, "personal.favoriteColor"));

    let request = PredictRequest {
        question: "What is your favorite color?".to_string(),
        user_email: Some("a@x.com".to_string()),
        ..PredictRequest::default()
    };
    engine.predict(&request).await.unwrap();

    let patterns = engine.user_patterns("a@x.com").await;
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].question_pattern, "what is your favorite color?");
    assert_eq!(
        patterns[0].owner_scope,
        OwnerScope::Private("a@x.com".to_string())
    );
    assert!(engine.user_patterns("other@x.com").await.is_empty());
}

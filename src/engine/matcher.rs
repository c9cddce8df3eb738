//! Tiered pattern matching
//!
//! Search order: the owner's private patterns (exact match on
//! normalized text), then the global set — exact first, then a
//! word-overlap fuzzy comparison per candidate. The first qualifying
//! candidate in store-iteration order wins; there is no ranking pass.
//! Matching is read-only and store failures degrade to a miss.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::normalizer::normalize;
use crate::store::StoreGateway;
use crate::types::Pattern;

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    PrivateExact,
    GlobalExact,
    GlobalFuzzy,
}

/// A successful lookup in pattern memory.
#[derive(Debug)]
pub struct MatchResult {
    pub pattern: Pattern,
    pub tier: MatchTier,
}

pub struct Matcher {
    gateway: Arc<StoreGateway>,
    fuzzy_threshold: f64,
}

impl Matcher {
    pub fn new(gateway: Arc<StoreGateway>, fuzzy_threshold: f64) -> Self {
        Self {
            gateway,
            fuzzy_threshold,
        }
    }

    pub async fn search(&self, question: &str, owner_email: Option<&str>) -> Option<MatchResult> {
        let normalized = normalize(question);

        // Private patterns always win over global ones.
        if let Some(owner) = owner_email.filter(|email| !email.trim().is_empty()) {
            match self.gateway.search_private_by_text(owner, &normalized).await {
                Ok(Some(pattern)) => {
                    debug!("private exact match: {}", pattern.id);
                    return Some(MatchResult {
                        pattern,
                        tier: MatchTier::PrivateExact,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("private pattern lookup failed for {}: {}", owner, e),
            }
        }

        let query_words: HashSet<&str> = normalized.split_whitespace().collect();

        for pattern in self.gateway.read_all_global_patterns().await {
            let candidate = normalize(&pattern.question_pattern);

            if candidate == normalized {
                debug!("global exact match: {}", pattern.id);
                return Some(MatchResult {
                    pattern,
                    tier: MatchTier::GlobalExact,
                });
            }

            let candidate_words: HashSet<&str> = candidate.split_whitespace().collect();
            match word_overlap(&query_words, &candidate_words) {
                Some(overlap) if overlap >= self.fuzzy_threshold => {
                    debug!("global fuzzy match: {} (overlap {:.2})", pattern.id, overlap);
                    return Some(MatchResult {
                        pattern,
                        tier: MatchTier::GlobalFuzzy,
                    });
                }
                _ => {}
            }
        }

        None
    }
}

/// Word-overlap similarity: `|intersection| / max(|a|, |b|)`.
/// `None` when either side has no words — a degenerate comparison, not
/// a zero score.
fn word_overlap(a: &HashSet<&str>, b: &HashSet<&str>) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let shared = a.intersection(b).count();
    Some(shared as f64 / a.len().max(b.len()) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileService;
    use crate::store::{MemoryStore, RelationalStore, GLOBAL_PATTERNS};
    use crate::types::{AnswerMapping, OwnerScope};
    use chrono::Utc;
    use serde_json::json;

    fn words(text: &str) -> HashSet<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn overlap_is_shared_over_larger_side() {
        let overlap = word_overlap(
            &words("alpha beta gamma one two three"),
            &words("alpha beta gamma delta epsilon zeta"),
        )
        .unwrap();
        assert!((overlap - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overlap_skips_empty_sides() {
        assert_eq!(word_overlap(&words(""), &words("a b")), None);
        assert_eq!(word_overlap(&words("a b"), &words("")), None);
    }

    async fn harness() -> (Arc<MemoryStore>, Arc<StoreGateway>) {
        let store = Arc::new(MemoryStore::new());
        let profiles = Arc::new(ProfileService::new(store.clone()));
        let gateway = Arc::new(StoreGateway::new(store.clone(), profiles));
        (store, gateway)
    }

    async fn seed_global(store: &MemoryStore, id: &str, question: &str, answer: &str) {
        store
            .insert(
                GLOBAL_PATTERNS,
                json!({
                    "id": id,
                    "question_pattern": question,
                    "intent": "personal.favoriteColor",
                    "answer_mappings": [
                        {"canonicalValue": answer, "variants": [answer], "contextOptions": []}
                    ],
                    "created_at": Utc::now().to_rfc3339(),
                    "last_used": Utc::now().to_rfc3339(),
                }),
            )
            .await
            .unwrap();
    }

    fn private_pattern(question: &str, answer: &str) -> Pattern {
        Pattern {
            id: String::new(),
            owner_scope: OwnerScope::Global,
            question_pattern: question.to_string(),
            intent: "personal.favoriteColor".to_string(),
            canonical_key: None,
            field_type: None,
            confidence: 0.9,
            answer_mappings: vec![AnswerMapping::seeded(answer, &[])],
            source: "AI".to_string(),
            created_at: Utc::now(),
            last_used: Utc::now(),
        }
    }

    #[tokio::test]
    async fn exact_global_match_ignores_case_and_whitespace() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "what is your favorite color?", "Blue").await;

        let matcher = Matcher::new(gateway, 0.5);
        let hit = matcher
            .search("  What is your FAVORITE color?  ", None)
            .await
            .unwrap();
        assert_eq!(hit.tier, MatchTier::GlobalExact);
        assert_eq!(hit.pattern.primary_answer(), Some("Blue"));
    }

    #[tokio::test]
    async fn fuzzy_match_respects_the_threshold_boundary() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "alpha beta gamma delta epsilon zeta", "Yes").await;
        let matcher = Matcher::new(gateway, 0.5);

        // 3 shared words over max(6, 6) = 0.5: meets the threshold.
        let hit = matcher.search("alpha beta gamma one two three", None).await;
        assert_eq!(hit.unwrap().tier, MatchTier::GlobalFuzzy);

        // 2 shared words over max(6, 6) ≈ 0.33: misses.
        assert!(matcher
            .search("alpha beta one two three four", None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn first_qualifying_candidate_wins_in_store_order() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "alpha beta gamma delta epsilon zeta", "First").await;
        seed_global(&store, "glob_2", "alpha beta gamma one two three", "Second").await;

        let matcher = Matcher::new(gateway, 0.5);
        // glob_2 would be an exact match, but glob_1 fuzzy-qualifies
        // first in iteration order and that is the contract.
        let hit = matcher
            .search("alpha beta gamma one two three", None)
            .await
            .unwrap();
        assert_eq!(hit.pattern.id, "glob_1");
        assert_eq!(hit.tier, MatchTier::GlobalFuzzy);
    }

    #[tokio::test]
    async fn private_patterns_win_over_global() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "what is your favorite color?", "Green").await;
        gateway
            .upsert_private_pattern(
                Some("a@x.com"),
                &private_pattern("What is your favorite color?", "Blue"),
            )
            .await
            .unwrap();

        let matcher = Matcher::new(gateway, 0.5);

        let hit = matcher
            .search("what is your favorite color?", Some("a@x.com"))
            .await
            .unwrap();
        assert_eq!(hit.tier, MatchTier::PrivateExact);
        assert_eq!(hit.pattern.primary_answer(), Some("Blue"));

        // Without an owner the global set answers.
        let hit = matcher
            .search("what is your favorite color?", None)
            .await
            .unwrap();
        assert_eq!(hit.tier, MatchTier::GlobalExact);
        assert_eq!(hit.pattern.primary_answer(), Some("Green"));
    }

    #[tokio::test]
    async fn private_miss_falls_through_to_global() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "what is your favorite color?", "Green").await;

        let matcher = Matcher::new(gateway, 0.5);
        let hit = matcher
            .search("what is your favorite color?", Some("nobody@x.com"))
            .await
            .unwrap();
        assert_eq!(hit.tier, MatchTier::GlobalExact);
    }

    #[tokio::test]
    async fn zero_word_candidates_are_skipped() {
        let (store, gateway) = harness().await;
        seed_global(&store, "glob_1", "   ", "Junk").await;

        let matcher = Matcher::new(gateway, 0.0);
        assert!(matcher.search("anything at all", None).await.is_none());
    }

    #[tokio::test]
    async fn no_match_is_an_explicit_none() {
        let (_store, gateway) = harness().await;
        let matcher = Matcher::new(gateway, 0.5);
        assert!(matcher.search("completely unseen question", None).await.is_none());
    }
}

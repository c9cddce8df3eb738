//! Stats aggregation
//!
//! Rolls up pattern, user, and feedback counts for the observability
//! endpoints. Recency windows are computed at call time — no caching,
//! no snapshots — and every count degrades to zero when the store
//! cannot answer, trading precision for availability of the summary
//! endpoints.

use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::store::{Filter, RelationalStore, FEEDBACKS, GLOBAL_PATTERNS, USER_PROFILES};
use crate::types::{GlobalStats, RecencyCount, UNKNOWN_INTENT};

pub struct StatsAggregator {
    store: Arc<dyn RelationalStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Total global patterns plus a per-intent breakdown.
    pub async fn global_stats(&self) -> GlobalStats {
        let rows = match self.store.select(GLOBAL_PATTERNS, "*", &[], false).await {
            Ok(result) => result.rows,
            Err(e) => {
                warn!("global stats unavailable: {}", e);
                return GlobalStats::default();
            }
        };

        let mut stats = GlobalStats {
            total_global_patterns: rows.len() as u64,
            ..GlobalStats::default()
        };
        for row in &rows {
            let intent = row
                .get("intent")
                .and_then(Value::as_str)
                .filter(|intent| !intent.is_empty())
                .unwrap_or(UNKNOWN_INTENT);
            *stats.intent_breakdown.entry(intent.to_string()).or_insert(0) += 1;
        }
        stats
    }

    /// Profile rows: total and updated within the last 24 hours.
    pub async fn user_count(&self) -> RecencyCount {
        self.recency_count(USER_PROFILES, "email", "updated_at").await
    }

    /// Feedback rows: total and created within the last 24 hours.
    pub async fn feedback_count(&self) -> RecencyCount {
        self.recency_count(FEEDBACKS, "id", "created_at").await
    }

    async fn recency_count(
        &self,
        table: &str,
        column: &str,
        timestamp_column: &'static str,
    ) -> RecencyCount {
        let total = self
            .count(table, column, &[])
            .await
            .unwrap_or_default();

        let yesterday = (Utc::now() - Duration::hours(24)).to_rfc3339();
        let recent_24h = self
            .count(table, column, &[Filter::Gte(timestamp_column, yesterday)])
            .await
            .unwrap_or_default();

        RecencyCount { total, recent_24h }
    }

    async fn count(&self, table: &str, column: &str, filters: &[Filter]) -> Option<u64> {
        match self.store.select(table, column, filters, true).await {
            Ok(result) => Some(result.count_or_len()),
            Err(e) => {
                warn!("counting {} unavailable: {}", table, e);
                None
            }
        }
    }
}

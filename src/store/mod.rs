//! Relational store abstraction
//!
//! The service talks to its backing store through the narrow
//! [`RelationalStore`] trait: select, insert, and merge-on-conflict
//! upsert over JSON rows. The production implementation speaks the
//! PostgREST wire protocol; an in-memory implementation with the same
//! conflict semantics backs local development and the test suite.
//! Everything above this layer receives the store by injection, so the
//! matcher and learner stay testable without a live endpoint.

pub mod gateway;
pub mod memory;
pub mod rest;

pub use gateway::{StoreGateway, UpsertError};
pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Table holding per-user learned patterns.
pub const LEARNED_PATTERNS: &str = "learned_patterns";
/// Table holding the shared, pre-curated pattern set.
pub const GLOBAL_PATTERNS: &str = "global_patterns";
/// Table holding user profiles; patterns reference it by email.
pub const USER_PROFILES: &str = "user_profiles";
/// Insert-only feedback interaction log.
pub const FEEDBACKS: &str = "feedbacks";

/// Store operation failures. Callers must at least be able to tell a
/// referential-integrity violation apart from everything else, because
/// that variant drives the stub-profile self-heal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("referential integrity violation: {0}")]
    ForeignKey(String),
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store rejected request: {0}")]
    Backend(String),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A row filter, mirroring the PostgREST operators the service uses.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, String),
    Gte(&'static str, String),
}

/// Rows returned by a store operation, plus the backend's exact row
/// count when one was requested and reported.
#[derive(Debug, Default)]
pub struct StoreRows {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

impl StoreRows {
    /// Exact count when the backend reported one, row length otherwise.
    pub fn count_or_len(&self) -> u64 {
        self.count.unwrap_or(self.rows.len() as u64)
    }
}

/// The narrow surface the engine needs from a relational backend.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Read rows matching every filter. `exact_count` asks the backend
    /// to report a precise row count alongside the data.
    async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &[Filter],
        exact_count: bool,
    ) -> StoreResult<StoreRows>;

    /// Insert a new row. Fails on key conflicts.
    async fn insert(&self, table: &str, row: Value) -> StoreResult<StoreRows>;

    /// Insert-or-update keyed by `on_conflict` (defaults to the row
    /// id). The later write's fields win.
    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> StoreResult<StoreRows>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_or_len_prefers_exact_count() {
        let rows = StoreRows {
            rows: vec![Value::Null, Value::Null],
            count: Some(40),
        };
        assert_eq!(rows.count_or_len(), 40);

        let rows = StoreRows {
            rows: vec![Value::Null, Value::Null],
            count: None,
        };
        assert_eq!(rows.count_or_len(), 2);
    }
}

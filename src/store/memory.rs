//! In-memory store backend
//!
//! Implements [`RelationalStore`] over plain JSON rows with the same
//! merge-on-conflict semantics as the REST backend. Used for local
//! development (`store.backend = "memory"`) and throughout the test
//! suite. The learned-patterns table enforces the same referential
//! constraint the real schema carries — a pattern row requires an
//! existing profile row for its owner — so the self-heal path behaves
//! identically against both backends.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    Filter, RelationalStore, StoreError, StoreResult, StoreRows, LEARNED_PATTERNS, USER_PROFILES,
};

/// In-process JSON row store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn field_str(row: &Value, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => field_str(row, column).is_some_and(|s| s == *value),
        // RFC 3339 timestamps in one shared format compare correctly
        // as strings, which is all the recency windows need.
        Filter::Gte(column, value) => field_str(row, column).is_some_and(|s| s >= *value),
    })
}

fn check_references(
    tables: &HashMap<String, Vec<Value>>,
    table: &str,
    row: &Value,
) -> StoreResult<()> {
    if table != LEARNED_PATTERNS {
        return Ok(());
    }
    let owner = field_str(row, "user_email").unwrap_or_default();
    let has_profile = tables
        .get(USER_PROFILES)
        .map(|rows| {
            rows.iter()
                .any(|profile| field_str(profile, "email").as_deref() == Some(owner.as_str()))
        })
        .unwrap_or(false);
    if has_profile {
        Ok(())
    } else {
        Err(StoreError::ForeignKey(format!(
            "insert or update on table \"{}\" violates foreign key constraint: no profile for {}",
            table, owner
        )))
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        _columns: &str,
        filters: &[Filter],
        exact_count: bool,
    ) -> StoreResult<StoreRows> {
        let tables = self.tables.read().await;
        let rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let count = exact_count.then_some(rows.len() as u64);
        Ok(StoreRows { rows, count })
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<StoreRows> {
        let mut tables = self.tables.write().await;
        check_references(&tables, table, &row)?;

        let rows = tables.entry(table.to_string()).or_default();
        if let Some(id) = field_str(&row, "id") {
            if rows
                .iter()
                .any(|existing| field_str(existing, "id").as_deref() == Some(id.as_str()))
            {
                return Err(StoreError::Backend(format!(
                    "duplicate key value on table \"{}\": id {}",
                    table, id
                )));
            }
        }
        rows.push(row.clone());
        Ok(StoreRows {
            rows: vec![row],
            count: None,
        })
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> StoreResult<StoreRows> {
        let mut tables = self.tables.write().await;
        check_references(&tables, table, &row)?;

        let key = on_conflict.unwrap_or("id");
        let key_value = field_str(&row, key);
        let rows = tables.entry(table.to_string()).or_default();

        let position = key_value.as_ref().and_then(|value| {
            rows.iter()
                .position(|candidate| field_str(candidate, key).as_deref() == Some(value.as_str()))
        });

        let merged = match position {
            Some(index) => {
                // Merge-on-conflict: the later write's fields win,
                // untouched columns keep their stored values.
                let target = &mut rows[index];
                if let (Some(target_map), Some(new_map)) = (target.as_object_mut(), row.as_object())
                {
                    for (k, v) in new_map {
                        target_map.insert(k.clone(), v.clone());
                    }
                }
                target.clone()
            }
            None => {
                rows.push(row.clone());
                row
            }
        };

        Ok(StoreRows {
            rows: vec![merged],
            count: None,
        })
    }
}

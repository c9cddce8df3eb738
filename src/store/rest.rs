//! PostgREST store backend
//!
//! Speaks the PostgREST REST dialect: `eq.`/`gte.` filter params,
//! `Prefer: resolution=merge-duplicates` for upserts, and
//! `Prefer: count=exact` with a `Content-Range` response header for
//! precise counts. Foreign-key violations surface as Postgres error
//! code 23503 in the error payload and are mapped to
//! [`StoreError::ForeignKey`] so the gateway can self-heal.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{Filter, RelationalStore, StoreError, StoreResult, StoreRows};
use crate::config::StoreConfig;

/// Postgres error code for a foreign-key violation.
const FK_VIOLATION_CODE: &str = "23503";

/// REST client for a PostgREST-compatible relational store.
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Config(
                "store.url is not set (expected e.g. https://xyz.supabase.co)".to_string(),
            ));
        }
        let parsed = Url::parse(&config.url)
            .map_err(|e| StoreError::Config(format!("store.url is invalid: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StoreError::Config(format!(
                "store.url must be http(s), got {}",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
    }

    async fn dispatch(&self, request: RequestBuilder) -> StoreResult<StoreRows> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let count = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let rows = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(rows)) => rows,
            Ok(Value::Null) | Err(_) => Vec::new(),
            Ok(other) => vec![other],
        };

        Ok(StoreRows { rows, count })
    }
}

#[async_trait]
impl RelationalStore for RestStore {
    async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &[Filter],
        exact_count: bool,
    ) -> StoreResult<StoreRows> {
        let mut request = self
            .request(Method::GET, table)
            .query(&[("select", columns)])
            .query(&filter_params(filters));
        if exact_count {
            request = request.header("Prefer", "count=exact");
        }
        self.dispatch(request).await
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<StoreRows> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&row);
        self.dispatch(request).await
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> StoreResult<StoreRows> {
        let mut request = self
            .request(Method::POST, table)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        if let Some(column) = on_conflict {
            request = request.query(&[("on_conflict", column)]);
        }
        self.dispatch(request).await
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(&'static str, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (*column, format!("eq.{}", value)),
            Filter::Gte(column, value) => (*column, format!("gte.{}", value)),
        })
        .collect()
}

/// Extract the total from a `Content-Range` header (`0-9/100` → 100).
fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.parse().ok()
}

fn classify_error(status: StatusCode, body: &str) -> StoreError {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        let code = payload.get("code").and_then(Value::as_str).unwrap_or("");
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(body);
        if code == FK_VIOLATION_CODE || message.contains("violates foreign key constraint") {
            return StoreError::ForeignKey(message.to_string());
        }
        return StoreError::Backend(format!("{}: {}", status, message));
    }
    StoreError::Backend(format!("{}: {}", status, body))
}

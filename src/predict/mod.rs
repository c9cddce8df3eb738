//! Hosted-model prediction
//!
//! The engine falls back to a hosted language model when pattern
//! memory misses. The model sits behind the [`PredictionService`]
//! trait so the engine can be tested without a network endpoint; the
//! production implementation is [`HostedModelClient`].

pub mod client;

pub use client::HostedModelClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{PredictRequest, Prediction};

/// The hosted model collaborator. May be slow (seconds) and may fail;
/// callers never let its failure take down the matcher path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, request: &PredictRequest) -> Result<Prediction>;
}

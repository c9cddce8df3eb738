//! FormFill - Autofill Backend Library
//!
//! The backend for a browser autofill extension:
//! - Pattern memory: tiered private/global question→answer matching
//! - Hosted-model fallback for questions memory cannot answer
//! - Idempotent, self-healing pattern persistence
//! - User profile storage and usage statistics
//!
//! # Example
//!
//! ```ignore
//! use formfill::{Config, MemoryStore, PatternEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     // wire a store, profile service, gateway, and prediction
//!     // client, then serve or call the engine directly
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod config;
pub mod store;   // Must come before engine since the engine depends on it
pub mod profile;
pub mod predict;
pub mod engine;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{
    AnswerMapping,
    GlobalStats,
    OwnerScope,
    Pattern,
    PredictRequest,
    Prediction,
    RecencyCount,
};

pub use engine::{
    normalize,
    Learner,
    MatchResult,
    MatchTier,
    Matcher,
    PatternEngine,
    StatsAggregator,
};

pub use store::{
    MemoryStore,
    RelationalStore,
    RestStore,
    StoreError,
    StoreGateway,
    UpsertError,
};

pub use config::Config;
pub use predict::{HostedModelClient, PredictionService};
pub use profile::ProfileService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Autofill Backend Library", NAME, VERSION)
}

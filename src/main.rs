//! FormFill - Autofill Backend Service
//!
//! Pattern memory, hosted-model fallback, and user data management
//! behind one HTTP front door.

// Use the library crate for all modules
use formfill::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (INFO level by default, use RUST_LOG to tune)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Run CLI
    cli::run().await
}

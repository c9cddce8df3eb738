//! CLI interface for formfill

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::engine::{PatternEngine, StatsAggregator};
use crate::predict::HostedModelClient;
use crate::profile::ProfileService;
use crate::store::{MemoryStore, RelationalStore, RestStore, StoreGateway};

#[derive(Parser)]
#[command(name = "formfill")]
#[command(about = "Autofill backend with pattern memory and hosted-model fallback", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Bind host
        #[arg(long, env = "FORMFILL_HOST")]
        host: Option<String>,
        /// Bind port
        #[arg(long, env = "FORMFILL_PORT")]
        port: Option<u16>,
        /// REST store base URL
        #[arg(long, env = "SUPABASE_URL")]
        store_url: Option<String>,
        /// REST store service-role key
        #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
        store_key: Option<String>,
        /// API key clients must send in X-API-Key
        #[arg(long, env = "APP_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Hosted model API key
        #[arg(long, env = "PREDICTION_API_KEY", hide_env_values = true)]
        prediction_key: Option<String>,
        /// Use the in-memory store backend (local development)
        #[arg(long)]
        memory_store: bool,
    },
    /// Configure the service
    Config {
        /// Set the minimum confidence for learning an answer
        #[arg(long)]
        set_learn_threshold: Option<f64>,
        /// Set the word-overlap ratio for fuzzy matching
        #[arg(long)]
        set_fuzzy_threshold: Option<f64>,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
    /// Print pattern, user, and feedback statistics
    Stats,
    /// Search pattern memory for a question
    Search {
        /// The form question to look up
        question: String,
        /// Restrict the private tier to this owner
        #[arg(long)]
        email: Option<String>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            store_url,
            store_key,
            api_key,
            prediction_key,
            memory_store,
        } => {
            let mut config = Config::load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(url) = store_url {
                config.store.url = url;
                config.store.backend = StoreBackend::Rest;
            }
            if let Some(key) = store_key {
                config.store.service_key = key;
            }
            if let Some(key) = api_key {
                config.auth.api_key = Some(key);
            }
            if let Some(key) = prediction_key {
                config.prediction.api_key = Some(key);
            }
            if memory_store {
                config.store.backend = StoreBackend::Memory;
            }

            serve(config).await
        }
        Commands::Config {
            set_learn_threshold,
            set_fuzzy_threshold,
            reset,
        } => {
            if reset {
                return crate::config::reset_config();
            }
            let mut acted = false;
            if let Some(value) = set_learn_threshold {
                crate::config::set_learn_threshold(value)?;
                acted = true;
            }
            if let Some(value) = set_fuzzy_threshold {
                crate::config::set_fuzzy_threshold(value)?;
                acted = true;
            }
            if !acted {
                crate::config::show_config()?;
            }
            Ok(())
        }
        Commands::Stats => {
            let config = Config::load()?;
            let store = build_store(&config)?;
            let stats = StatsAggregator::new(store);

            let global = stats.global_stats().await;
            println!("Global patterns: {}", global.total_global_patterns);
            for (intent, count) in &global.intent_breakdown {
                println!("  {:<32} {}", intent, count);
            }
            let users = stats.user_count().await;
            println!("Users:    {} total, {} in the last 24h", users.total, users.recent_24h);
            let feedback = stats.feedback_count().await;
            println!("Feedback: {} total, {} in the last 24h", feedback.total, feedback.recent_24h);
            Ok(())
        }
        Commands::Search { question, email } => {
            let config = Config::load()?;
            let store = build_store(&config)?;
            let profiles = Arc::new(ProfileService::new(store.clone()));
            let gateway = Arc::new(StoreGateway::new(store, profiles));
            let matcher =
                crate::engine::Matcher::new(gateway, config.engine.fuzzy_match_threshold);

            match matcher.search(&question, email.as_deref()).await {
                Some(hit) => {
                    println!("Match ({:?}):", hit.tier);
                    println!("{}", serde_json::to_string_pretty(&hit.pattern)?);
                }
                None => println!("No matching pattern."),
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let store = build_store(&config)?;
    let profiles = Arc::new(ProfileService::new(store.clone()));
    let gateway = Arc::new(StoreGateway::new(store.clone(), profiles.clone()));
    let stats = Arc::new(StatsAggregator::new(store));
    let prediction = Arc::new(HostedModelClient::new(&config.prediction)?);
    let engine = Arc::new(PatternEngine::new(
        config.engine.clone(),
        gateway,
        stats,
        prediction,
    ));

    crate::server::start(Arc::new(config), engine, profiles).await
}

fn build_store(config: &Config) -> Result<Arc<dyn RelationalStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store backend");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Rest => Ok(Arc::new(
            RestStore::new(&config.store).context("Failed to initialize store client")?,
        )),
    }
}

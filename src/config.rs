//! Configuration management
//!
//! Manages service configuration including the HTTP server, API key,
//! store backend, hosted model, and engine thresholds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// API key authentication
    #[serde(default)]
    pub auth: AuthConfig,
    /// Relational store backend
    #[serde(default)]
    pub store: StoreConfig,
    /// Hosted model fallback
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// Pattern memory engine thresholds
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static API key expected in the `X-API-Key` header. When unset,
    /// authentication is disabled and the server logs a warning at
    /// startup. Production deployments MUST set this.
    pub api_key: Option<String>,
}

/// Which `RelationalStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgREST-style remote store.
    Rest,
    /// In-process store for local development and tests.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    /// Base URL of the REST store, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Service-role key sent as `apikey` and bearer token.
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_store_timeout() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: String::new(),
            service_key: String::new(),
            timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// OpenAI-compatible API base, e.g. `https://openrouter.ai/api/v1`.
    #[serde(default = "default_prediction_base_url")]
    pub base_url: String,
    #[serde(default = "default_prediction_model")]
    pub model: String,
    /// Usually supplied via `PREDICTION_API_KEY` rather than the file.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_prediction_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_prediction_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_prediction_model() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}

fn default_prediction_timeout() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    512
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: default_prediction_base_url(),
            model: default_prediction_model(),
            api_key: None,
            timeout_secs: default_prediction_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Word-overlap ratio a global candidate must reach to fuzzy-match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_match_threshold: f64,
    /// Minimum model confidence before an answer is remembered.
    #[serde(default = "default_learn_threshold")]
    pub learn_threshold: f64,
    /// Confidence reported for answers served from pattern memory.
    #[serde(default = "default_memory_confidence")]
    pub pattern_memory_confidence: f64,
}

fn default_fuzzy_threshold() -> f64 {
    0.5
}

fn default_learn_threshold() -> f64 {
    0.70
}

fn default_memory_confidence() -> f64 {
    0.95
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: default_fuzzy_threshold(),
            learn_threshold: default_learn_threshold(),
            pattern_memory_confidence: default_memory_confidence(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            store: StoreConfig::default(),
            prediction: PredictionConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default file location
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to the default file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "formfill", "formfill")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Server:");
    println!("  host:                      {}", config.server.host);
    println!("  port:                      {}", config.server.port);
    println!("  api key:                   {}", if config.auth.api_key.is_some() { "configured" } else { "NOT configured (auth disabled)" });
    println!("Store:");
    println!("  backend:                   {:?}", config.store.backend);
    println!("  url:                       {}", if config.store.url.is_empty() { "<unset>" } else { &config.store.url });
    println!("  timeout:                   {}s", config.store.timeout_secs);
    println!("Prediction:");
    println!("  base url:                  {}", config.prediction.base_url);
    println!("  model:                     {}", config.prediction.model);
    println!("  api key:                   {}", if config.prediction.api_key.is_some() { "configured" } else { "NOT configured" });
    println!("Engine:");
    println!("  fuzzy match threshold:     {}", config.engine.fuzzy_match_threshold);
    println!("  learn threshold:           {}", config.engine.learn_threshold);
    println!("  pattern memory confidence: {}", config.engine.pattern_memory_confidence);

    println!("\n💡 Use 'formfill config set-learn-threshold <value>' or 'set-fuzzy-threshold <value>' to tune the engine");

    Ok(())
}

/// Set the minimum confidence required before an answer is learned
pub fn set_learn_threshold(value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("Learn threshold must be between 0.0 and 1.0, got {}", value);
    }
    let mut config = Config::load()?;
    config.engine.learn_threshold = value;
    config.save()?;
    println!("Learn threshold set to {}", value);
    Ok(())
}

/// Set the word-overlap ratio required for a fuzzy match
pub fn set_fuzzy_threshold(value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("Fuzzy match threshold must be between 0.0 and 1.0, got {}", value);
    }
    let mut config = Config::load()?;
    config.engine.fuzzy_match_threshold = value;
    config.save()?;
    println!("Fuzzy match threshold set to {}", value);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}

//! Generation run configuration.
//!
//! Values come from `FORGE_*` / `GEMINI_*` environment variables on top of
//! defaults, and can be overridden with builder methods (the CLI does this
//! for flags).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::conversation::{OutputLanguage, DEFAULT_ROUNDS, DEFAULT_TURN_PAUSE_MS};
use crate::llm::models::DEFAULT_ENVIRONMENT;
use crate::llm::retry::DEFAULT_MAX_ATTEMPTS;
use crate::llm::{RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT_SECS};
use crate::scheduler::{
    ProgressAccounting, SchedulerConfig, DEFAULT_BATCH_PAUSE_MS, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_IDLE_BATCHES,
};
use crate::storage::{DEFAULT_COLLECTION, DEFAULT_DATABASE_URL};

/// Default target record count.
pub const DEFAULT_TARGET: u64 = 1000;

/// Default location of the role to model table.
pub const DEFAULT_MODEL_CONFIG: &str = "config/models_config.json";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a generation run.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    // Generation service
    /// Gemini API key; required only by commands that generate.
    pub api_key: Option<String>,
    /// Gemini endpoint override.
    pub api_base: Option<String>,
    /// Model override; the model table is consulted when unset.
    pub model: Option<String>,
    pub max_attempts: u32,
    pub request_timeout: Duration,

    // Run shape
    pub target: u64,
    pub concurrency: usize,
    pub rounds: usize,
    pub turn_pause: Duration,
    pub batch_pause: Duration,
    pub accounting: ProgressAccounting,
    pub max_idle_batches: usize,
    pub language: OutputLanguage,

    // Storage
    pub database_url: String,
    pub collection: String,

    // Model table
    pub model_config_path: PathBuf,
    pub environment: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),

            target: DEFAULT_TARGET,
            concurrency: DEFAULT_CONCURRENCY,
            rounds: DEFAULT_ROUNDS,
            turn_pause: Duration::from_millis(DEFAULT_TURN_PAUSE_MS),
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            accounting: ProgressAccounting::Optimistic,
            max_idle_batches: DEFAULT_MAX_IDLE_BATCHES,
            language: OutputLanguage::Korean,

            database_url: DEFAULT_DATABASE_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),

            model_config_path: PathBuf::from(DEFAULT_MODEL_CONFIG),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl GenerationConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GEMINI_API_KEY`: API key (required to generate)
    /// - `GEMINI_API_BASE`: API endpoint override
    /// - `GEMINI_MODEL`: model override
    /// - `FORGE_DATABASE_URL`: store URL (default: sqlite://dialogue_forge.db)
    /// - `FORGE_COLLECTION`: collection name (default: synthetic_conversations)
    /// - `FORGE_TARGET`: target record count (default: 1000)
    /// - `FORGE_CONCURRENCY`: simulations per batch (default: 5)
    /// - `FORGE_ROUNDS`: coach replies per record (default: 3)
    /// - `FORGE_MAX_ATTEMPTS`: calls per generation before giving up (default: 10)
    /// - `FORGE_REQUEST_TIMEOUT_SECS`: per-attempt timeout (default: 30)
    /// - `FORGE_TURN_PAUSE_MS`: pause after each turn (default: 100)
    /// - `FORGE_BATCH_PAUSE_MS`: pause between batches (default: 100)
    /// - `FORGE_ACCOUNTING`: `optimistic` or `persisted` (default: optimistic)
    /// - `FORGE_MAX_IDLE_BATCHES`: empty batches before giving up under
    ///   persisted accounting (default: 5)
    /// - `FORGE_LANGUAGE`: output language (default: Korean)
    /// - `FORGE_MODEL_CONFIG`: model table path (default: config/models_config.json)
    /// - `FORGE_ENV`: model table environment (default: development)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Generation service
        config.api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        config.api_base = lookup("GEMINI_API_BASE");
        config.model = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty());

        if let Some(val) = lookup("FORGE_MAX_ATTEMPTS") {
            config.max_attempts = parse_env_value(&val, "FORGE_MAX_ATTEMPTS")?;
        }

        if let Some(val) = lookup("FORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "FORGE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        // Run shape
        if let Some(val) = lookup("FORGE_TARGET") {
            config.target = parse_env_value(&val, "FORGE_TARGET")?;
        }

        if let Some(val) = lookup("FORGE_CONCURRENCY") {
            config.concurrency = parse_env_value(&val, "FORGE_CONCURRENCY")?;
        }

        if let Some(val) = lookup("FORGE_ROUNDS") {
            config.rounds = parse_env_value(&val, "FORGE_ROUNDS")?;
        }

        if let Some(val) = lookup("FORGE_TURN_PAUSE_MS") {
            let ms: u64 = parse_env_value(&val, "FORGE_TURN_PAUSE_MS")?;
            config.turn_pause = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("FORGE_BATCH_PAUSE_MS") {
            let ms: u64 = parse_env_value(&val, "FORGE_BATCH_PAUSE_MS")?;
            config.batch_pause = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("FORGE_ACCOUNTING") {
            config.accounting = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "FORGE_ACCOUNTING".to_string(),
                message,
            })?;
        }

        if let Some(val) = lookup("FORGE_MAX_IDLE_BATCHES") {
            config.max_idle_batches = parse_env_value(&val, "FORGE_MAX_IDLE_BATCHES")?;
        }

        if let Some(val) = lookup("FORGE_LANGUAGE") {
            config.language = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "FORGE_LANGUAGE".to_string(),
                message,
            })?;
        }

        // Storage
        if let Some(val) = lookup("FORGE_DATABASE_URL") {
            config.database_url = val;
        }

        if let Some(val) = lookup("FORGE_COLLECTION") {
            config.collection = val;
        }

        // Model table
        if let Some(val) = lookup("FORGE_MODEL_CONFIG") {
            config.model_config_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("FORGE_ENV") {
            config.environment = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.rounds == 0 {
            return Err(ConfigError::ValidationFailed(
                "rounds must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_idle_batches == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_idle_batches must be greater than 0".to_string(),
            ));
        }

        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_url cannot be empty".to_string(),
            ));
        }

        if self.collection.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "collection cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The API key, or an error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))
    }

    /// Retry policy derived from `max_attempts`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    /// Scheduler settings derived from this configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_collection(self.collection.clone())
            .with_rounds(self.rounds)
            .with_batch_pause(self.batch_pause)
            .with_accounting(self.accounting)
            .with_max_idle_batches(self.max_idle_batches)
    }

    /// Builder method to set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder method to set the model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builder method to set the target record count.
    pub fn with_target(mut self, target: u64) -> Self {
        self.target = target;
        self
    }

    /// Builder method to set the batch concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder method to set rounds per record.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Builder method to set the progress accounting mode.
    pub fn with_accounting(mut self, accounting: ProgressAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Builder method to set the collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Builder method to set the output language.
    pub fn with_language(mut self, language: OutputLanguage) -> Self {
        self.language = language;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

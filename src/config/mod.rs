// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::engine::{EngineMode, EngineOptions};
use crate::session::{InferOptions, SessionConfig};

/// Configuration for the model artifact and its token budgets
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Path to the .gguf model file
    pub path: PathBuf,
    /// Context window size, also used as the generation cap
    pub total_tokens: usize,
    /// Optional prompt limit, must not exceed total_tokens
    #[serde(default)]
    pub input_tokens: Option<usize>,
    /// Mode the engine is first loaded in
    #[serde(default)]
    pub mode: EngineMode,
}

/// Defaults applied to every inference call
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Stop sequence used when none is given on the command line
    #[serde(default)]
    pub stop: Option<String>,
    /// Whether to append the stop sequence to returned text
    #[serde(default = "default_keep_stop")]
    pub keep_stop: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            stop: None,
            keep_stop: default_keep_stop(),
        }
    }
}

fn default_keep_stop() -> bool {
    true
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory for a daily rolling file
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Model-related settings
    pub model: ModelConfig,
    /// Extra options handed to the engine untouched
    #[serde(default)]
    pub engine: EngineOptions,
    /// Generation defaults
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with GGUF_LLAMA_ (`__` between sections)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        // Check if config directory exists
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        // Check if default.toml exists
        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        // Load and validate configuration
        let settings = Config::builder()
            .add_source(File::from(default_config))
            .add_source(File::from(local_config).required(false))
            .add_source(
                Environment::with_prefix("GGUF_LLAMA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.total_tokens == 0 {
            return Err(ConfigError::Message(
                "model.total_tokens must be greater than 0".to_string()
            ));
        }

        if let Some(input) = self.model.input_tokens {
            if input > self.model.total_tokens {
                return Err(ConfigError::Message(format!(
                    "model.input_tokens ({}) must not exceed model.total_tokens ({})",
                    input, self.model.total_tokens
                )));
            }
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log directory if configured and doesn't exist
        if let Some(log_dir) = &self.logging.file {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model_path: self.model.path.clone(),
            total_token_budget: self.model.total_tokens,
            input_token_budget: self.model.input_tokens,
            mode: self.model.mode,
            options: self.engine.clone(),
        }
    }

    /// Session config for a command that needs `mode`, or the configured
    /// `model.mode` when the command works in either.
    pub fn session_config_for(&self, mode: Option<EngineMode>) -> SessionConfig {
        let config = self.session_config();
        match mode {
            Some(mode) => config.with_mode(mode),
            None => config,
        }
    }

    pub fn infer_options(&self) -> InferOptions {
        InferOptions {
            text_only: true,
            stop: self.generation.stop.clone(),
            keep_stop: self.generation.keep_stop,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Engine configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Collapse runs of whitespace in compiled SQL into single spaces
    pub shrink_whitespace: bool,

    /// Cache parsed template ASTs keyed by template-text digest
    pub template_cache_enabled: bool,

    /// Upper bound on the number of elements a single `<foreach>` may unroll
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Max loop unroll must be between 1 and 1000000"
    ))]
    pub max_loop_unroll: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shrink_whitespace: true,
            template_cache_enabled: true,
            max_loop_unroll: 10_000,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            shrink_whitespace: parse_env_var("SQLWEAVE_SHRINK_WHITESPACE", "true")?,
            template_cache_enabled: parse_env_var("SQLWEAVE_TEMPLATE_CACHE_ENABLED", "true")?,
            max_loop_unroll: parse_env_var("SQLWEAVE_MAX_LOOP_UNROLL", "10000")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            shrink_whitespace: cli.shrink_whitespace,
            template_cache_enabled: cli.template_cache_enabled,
            max_loop_unroll: cli.max_loop_unroll,
        };

        config.validate()?;
        Ok(config)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub shrink_whitespace: bool,
    pub template_cache_enabled: bool,
    pub max_loop_unroll: usize,
}

/// Parse an environment variable with a default value
fn parse_env_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: name.to_string(),
        value,
        source: Box::new(e),
    })
}

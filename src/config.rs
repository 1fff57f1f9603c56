//! Configuration management for wayfinder.
//!
//! Configuration can be set via environment variables:
//! - `DEEPSEEK_API_KEY` - Required. API key for the DeepSeek chat-completions endpoint.
//! - `DEEPSEEK_BASE_URL` - Optional. OpenAI-compatible base URL. Defaults to `https://api.deepseek.com/v1`.
//! - `AMAP_API_KEY` - Required. Amap (Gaode) web service key for the map tools.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `deepseek-chat`.
//! - `MAX_ITERATIONS` - Optional. Maximum reason-act cycles per query. Defaults to `3`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// DeepSeek API key
    pub deepseek_api_key: String,

    /// Base URL of the OpenAI-compatible completions endpoint
    pub deepseek_base_url: String,

    /// Amap web service key
    pub amap_api_key: String,

    /// Model identifier sent with every completion request
    pub default_model: String,

    /// Maximum reason-act cycles per query
    pub max_iterations: usize,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `DEEPSEEK_API_KEY` or
    /// `AMAP_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let deepseek_api_key = std::env::var("DEEPSEEK_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("DEEPSEEK_API_KEY".to_string()))?;

        let deepseek_base_url = std::env::var("DEEPSEEK_BASE_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string());

        let amap_api_key = std::env::var("AMAP_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("AMAP_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());

        let max_iterations = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        Ok(Self {
            deepseek_api_key,
            deepseek_base_url,
            amap_api_key,
            default_model,
            max_iterations,
            host,
            port,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(deepseek_api_key: String, amap_api_key: String, default_model: String) -> Self {
        Self {
            deepseek_api_key,
            deepseek_base_url: "https://api.deepseek.com/v1".to_string(),
            amap_api_key,
            default_model,
            max_iterations: 3,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

//! Environment configuration
//!
//! All values are read once at startup. A missing API key is fatal before
//! any session is created.

use thiserror::Error;

/// Default hosted model revision.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "API Key Gemini tidak ditemukan. Harap tambahkan GEMINI_API_KEY ke environment Anda."
    )]
    MissingApiKey,
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Generation parameters sent with every model request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    /// Creativity control (0.0 factual, 1.0 creative).
    pub temperature: f32,
    /// Cap on reply length in tokens.
    pub max_output_tokens: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 500,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model_name: String,
    pub port: u16,
    pub generation: GenerationParams,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let model_name =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let port = match std::env::var("WISATA_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "WISATA_PORT",
                value: raw,
            })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            api_key,
            model_name,
            port,
            generation: GenerationParams::default(),
        })
    }
}

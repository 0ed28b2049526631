use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// LLM transport settings (base URL, key, timeout, temperature) are read separately by
/// `OpenAiClientConfig::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL. `None` serves the seed set from memory and disables
    /// conversation history.
    pub redis_url: Option<String>,
    /// Model id sent with every completion request.
    pub model: String,
    /// JSON seed file replacing the bundled demo data.
    pub seed_path: Option<PathBuf>,
    /// Conversation history TTL in seconds.
    pub convo_ttl_secs: Option<u64>,
}

impl Config {
    /// Required:
    /// - `KAHU_LLM_MODEL`: model id served by the OpenAI-compatible endpoint
    ///
    /// Optional:
    /// - `REDIS_URL`: Redis connection string
    /// - `KAHU_SEED_PATH`: path to a seed JSON file
    /// - `CONVO_TTL_SECS`: conversation TTL (default 86400)
    pub fn from_env() -> Result<Self, AppError> {
        let model = std::env::var("KAHU_LLM_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                AppError::Config("KAHU_LLM_MODEL environment variable is required".to_string())
            })?;

        let seed_path = match std::env::var("KAHU_SEED_PATH") {
            Ok(path) => {
                let path = Path::new(&path).to_path_buf();
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "seed file not found at {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            Err(_) => None,
        };

        let convo_ttl_secs = match std::env::var("CONVO_TTL_SECS") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!("CONVO_TTL_SECS must be a number of seconds, got '{raw}'"))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            model,
            seed_path,
            convo_ttl_secs,
        })
    }
}

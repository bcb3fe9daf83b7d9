use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::SummarizerConfig;
use crate::error::{AppError, Result};

const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_wikipedia_api_url")]
    pub wikipedia_api_url: String,

    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    #[serde(default = "default_nearby_radius")]
    pub nearby_radius_meters: u32,

    #[serde(default = "default_nearby_limit")]
    pub nearby_limit: u32,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    #[serde(default = "default_cache_max_age_days")]
    pub cache_max_age_days: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_openai_timeout")]
    pub openai_timeout_secs: u64,
}

// The directory is created when the store opens, not here.
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wiki-pocket")
        .join("articles.db")
        .to_string_lossy()
        .to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_wikipedia_api_url() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_search_limit() -> u32 {
    10
}

fn default_nearby_radius() -> u32 {
    10_000
}

fn default_nearby_limit() -> u32 {
    10
}

fn default_recent_limit() -> usize {
    10
}

fn default_cache_max_age_days() -> u32 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

fn default_openai_timeout() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            wikipedia_api_url: default_wikipedia_api_url(),
            search_limit: default_search_limit(),
            nearby_radius_meters: default_nearby_radius(),
            nearby_limit: default_nearby_limit(),
            recent_limit: default_recent_limit(),
            cache_max_age_days: default_cache_max_age_days(),
            request_timeout_secs: default_request_timeout(),
            openai_timeout_secs: default_openai_timeout(),
        }
    }
}

impl Config {
    /// Loads the user config, writing defaults on first run. The
    /// `OPENAI_API_KEY` environment variable wins over the file.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(key) = std::env::var(OPENAI_KEY_ENV) {
            if !key.trim().is_empty() {
                config.openai_api_key = Some(key);
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wiki-pocket")
            .join("config.toml")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cache_max_age_days))
    }

    /// Summarizer settings, or `None` when no usable API key is configured.
    pub fn summarizer_config(&self) -> Option<SummarizerConfig> {
        let api_key = self
            .openai_api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())?;

        Some(SummarizerConfig {
            api_key: api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            timeout: Duration::from_secs(self.openai_timeout_secs),
        })
    }
}

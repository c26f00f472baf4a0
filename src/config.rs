use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::transport::DEFAULT_API_URL;

const APP_DIR: &str = "recipe-feed";
pub const TOKEN_ENV_VAR: &str = "RECIPE_FEED_TELEGRAM_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub telegram_bot_token: Option<String>,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,

    #[serde(default = "default_source_assets_url")]
    pub source_assets_url: String,

    /// Recipes per list message.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_fetch_pause_secs")]
    pub fetch_pause_secs: f64,

    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_ingest_interval")]
    pub ingest_interval_minutes: u32,

    #[serde(default = "default_fulfill_interval")]
    pub fulfill_interval_minutes: u32,

    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    #[serde(default = "default_fulfill_concurrency")]
    pub fulfill_concurrency: usize,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("recipes.db").to_string_lossy().to_string()
}

fn default_telegram_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_source_base_url() -> String {
    "https://www.bonappetit.com".to_string()
}

fn default_source_assets_url() -> String {
    "https://assets.bonappetit.com".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_fetch_pause_secs() -> f64 {
    3.0
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_ingest_interval() -> u32 {
    60
}

fn default_fulfill_interval() -> u32 {
    10
}

fn default_max_subscriptions() -> usize {
    50
}

fn default_fulfill_concurrency() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            telegram_bot_token: None,
            telegram_api_url: default_telegram_api_url(),
            source_base_url: default_source_base_url(),
            source_assets_url: default_source_assets_url(),
            page_size: default_page_size(),
            fetch_pause_secs: default_fetch_pause_secs(),
            fetch_max_attempts: default_fetch_max_attempts(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            ingest_interval_minutes: default_ingest_interval(),
            fulfill_interval_minutes: default_fulfill_interval(),
            max_subscriptions: default_max_subscriptions(),
            fulfill_concurrency: default_fulfill_concurrency(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            config
        };

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                config.telegram_bot_token = Some(token.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("telegram_api_url", &self.telegram_api_url),
            ("source_base_url", &self.source_base_url),
            ("source_assets_url", &self.source_assets_url),
        ] {
            Url::parse(value).map_err(|e| AppError::Config(format!("{name}: {e}")))?;
        }
        if self.page_size == 0 {
            return Err(AppError::Config("page_size must be positive".to_string()));
        }
        if self.fetch_max_attempts == 0 {
            return Err(AppError::Config(
                "fetch_max_attempts must be positive".to_string(),
            ));
        }
        if !self.fetch_pause_secs.is_finite() || self.fetch_pause_secs < 0.0 {
            return Err(AppError::Config(
                "fetch_pause_secs must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_pause(&self) -> Duration {
        Duration::from_secs_f64(self.fetch_pause_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn require_token(&self) -> Result<&str> {
        self.telegram_bot_token.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "telegram_bot_token is not set (config file or {TOKEN_ENV_VAR})"
            ))
        })
    }
}

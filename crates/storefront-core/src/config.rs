//! Client configuration.
//!
//! Settings are read from `~/.config/storefront/config.json` when it exists,
//! then the backend origin can be overridden with `STOREFRONT_API_URL`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{ACCESS_TOKEN_TTL_DAYS, REFRESH_TOKEN_TTL_DAYS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "storefront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable selecting the backend origin
pub const API_URL_ENV: &str = "STOREFRONT_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Where to send the user when the session cannot be recovered
    pub login_path: String,
    pub home_path: String,
    pub admin_path: String,
    /// Role that lands on `admin_path` after login
    pub admin_role: String,
    pub access_token_ttl_days: i64,
    pub refresh_token_ttl_days: i64,
    /// Per-request timeout. `None` leaves it to the HTTP client default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            login_path: "/auth/login".to_string(),
            home_path: "/".to_string(),
            admin_path: "/admin/dashboard".to_string(),
            admin_role: "admin".to_string(),
            access_token_ttl_days: ACCESS_TOKEN_TTL_DAYS,
            refresh_token_ttl_days: REFRESH_TOKEN_TTL_DAYS,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, ignoring any config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.to_string();
        self
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Absolute URL for an API path such as `/api/auth/login`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

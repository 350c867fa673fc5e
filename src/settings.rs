use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::repository::RepositoryConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub remote_base_url: Url,
    pub remote_timeout_ms: u64,
    pub remote_token: Option<String>,
    pub data_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub revalidate_throttle_secs: u64,
    pub debug: bool,
    pub auth_token: String,
    pub enable_swagger: bool,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Load from environment variables with APP_ prefix
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .set_default("remote_base_url", "http://localhost:3333")?
            .set_default("remote_timeout_ms", 5000)?
            .set_default("data_dir", "./data")?
            .set_default("cache_ttl_secs", 60)?
            .set_default("revalidate_throttle_secs", 30)?
            .set_default("debug", false)?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .build()?;

        config.try_deserialize()
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            revalidate_throttle: Duration::from_secs(self.revalidate_throttle_secs),
        }
    }
}

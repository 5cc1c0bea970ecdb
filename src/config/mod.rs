use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl SiteConfig {
    /// Site URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Limits applied to post creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_create_max_requests")]
    pub create_max_requests: usize,
    #[serde(default = "default_create_window_secs")]
    pub create_window_secs: u64,
    /// Seconds between sweeps of idle identifiers (0 = never sweep)
    #[serde(default)]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create_max_requests: default_create_max_requests(),
            create_window_secs: default_create_window_secs(),
            sweep_interval_secs: 0,
        }
    }
}

impl RateLimitConfig {
    pub fn create_window(&self) -> Duration {
        Duration::from_secs(self.create_window_secs)
    }
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_create_max_requests() -> usize {
    10
}

fn default_create_window_secs() -> u64 {
    3600
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run `inkpost init` to create one.",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site.url.trim().is_empty() {
            anyhow::bail!("site.url must not be empty");
        }
        url::Url::parse(&self.site.url)
            .map_err(|e| anyhow::anyhow!("site.url '{}' is not a valid URL: {}", self.site.url, e))?;
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        if self.rate_limit.create_max_requests == 0 {
            anyhow::bail!("rate_limit.create_max_requests must be greater than 0");
        }
        if self.rate_limit.create_window_secs == 0 {
            anyhow::bail!("rate_limit.create_window_secs must be greater than 0");
        }
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than 0");
        }
        Ok(())
    }

    /// Default configuration written by `inkpost init`.
    pub fn default_toml(name: &str) -> String {
        let title = toml::Value::String(name.to_string());
        format!(
            r#"[site]
title = {title}
description = "Latest blog posts"
url = "http://localhost:3000"
language = "en-US"

[server]
host = "127.0.0.1"
port = 3000
request_timeout_secs = 30

[database]
path = "./data/inkpost.db"
pool_size = 10

[rate_limit]
create_max_requests = 10
create_window_secs = 3600
sweep_interval_secs = 0
"#
        )
    }
}

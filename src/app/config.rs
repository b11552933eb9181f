// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_debug")]
    pub log_json: bool,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // Endpoints
    pub rpc_url: String,
    pub price_api_url: String,
    pub swap_api_url: String,

    // Secrets
    /// Passphrase the process-wide vault key is derived from.
    pub vault_key: String,

    // Monitor loop
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,

    // External call bounds
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
}

// Defaults
fn default_debug() -> bool {
    false
}
fn default_chain_id() -> u64 {
    1
}
fn default_database_url() -> String {
    "sqlite://orders.db".into()
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_sweep_concurrency() -> usize {
    8
}
fn default_http_timeout_ms() -> u64 {
    5_000
}
fn default_receipt_poll_ms() -> u64 {
    1_500
}
fn default_receipt_timeout_ms() -> u64 {
    90_000
}

impl GlobalSettings {
    pub fn load(config_path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(AppError::Config(format!("Config file not found: {path}")));
                }
                builder = builder.add_source(File::with_name(path));
            }
            None => {
                builder = builder.add_source(File::with_name("config").required(false));
            }
        }

        let settings: GlobalSettings = builder
            .add_source(Environment::with_prefix("SENTINEL"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("rpc_url", &self.rpc_url),
            ("price_api_url", &self.price_api_url),
            ("swap_api_url", &self.swap_api_url),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::Config(format!("Invalid {name} '{value}': {e}")))?;
        }
        if self.vault_key.trim().is_empty() {
            return Err(AppError::Config("vault_key must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("poll_interval_secs must be >= 1".into()));
        }
        if self.sweep_concurrency == 0 {
            return Err(AppError::Config("sweep_concurrency must be >= 1".into()));
        }
        Ok(())
    }
}

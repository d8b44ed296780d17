//! Client configuration
//!
//! Where the relay lives and where session state is stored. Loaded with the
//! `config` crate from optional files and `ML_TESTER__` prefixed environment
//! variables.

use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8080/api/proxy";
pub const DEFAULT_STORAGE_DIR: &str = ".ml-tester";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub relay_url: String,
    pub storage_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables and config files
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let environment =
            std::env::var("ML_TESTER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/client").required(false))
            .add_source(
                config::File::with_name(&format!("config/environments/client-{}", environment))
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("ML_TESTER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.relay_url.trim().is_empty() {
            return Err("relay_url cannot be empty".to_string());
        }
        if !(self.relay_url.starts_with("http://") || self.relay_url.starts_with("https://")) {
            return Err(format!("relay_url must be an http(s) URL: {}", self.relay_url));
        }
        Ok(())
    }
}

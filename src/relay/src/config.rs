//! Application Configuration
//!
//! Configuration for the ML Tester relay. Settings are loaded with the `config`
//! crate from an optional YAML/TOML file per environment and `APP__` prefixed
//! environment variables; every field has a default so the relay starts with
//! no files at all.

use serde::Deserialize;

use ml_tester_shared::vision::DEFAULT_API_VERSION;

/// Main configuration for the relay
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: String,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; inline images travel as base64
    pub max_body_bytes: usize,
}

/// Outbound call settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub user_agent: String,
    pub vision_api_version: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub json_logs: bool,
    pub log_filter: String,
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables and config files
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .set_default("environment", environment.clone())?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/environments/{}", environment))
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Check if the environment is development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Check if the environment is production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.max_body_bytes == 0 {
            return Err(anyhow::anyhow!("server.max_body_bytes must be positive"));
        }
        if self.upstream.vision_api_version.trim().is_empty() {
            return Err(anyhow::anyhow!("upstream.vision_api_version must be set"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("ml-tester-relay/{}", env!("CARGO_PKG_VERSION")),
            vision_api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: true,
            log_filter: "ml_tester_relay=debug,tower_http=debug,axum::rejection=trace".to_string(),
            metrics_enabled: true,
        }
    }
}

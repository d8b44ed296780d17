//! Application state management for the relay
//!
//! The relay keeps no per-request state; the shared pieces are the outbound
//! HTTP client, the forwarder built on it and the metrics registry.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::services::{forwarder::RelayForwarder, metrics::MetricsService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub forwarder: Arc<RelayForwarder>,
    pub metrics: Arc<MetricsService>,
    pub started_at: Instant,
}

impl AppState {
    /// Initialize application state with all dependencies
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing relay state...");

        let http_client = create_http_client(&config)?;
        info!("HTTP client initialized");

        let metrics = Arc::new(MetricsService::new()?);
        info!("Metrics service initialized");

        let forwarder = Arc::new(RelayForwarder::new(http_client, &config.upstream));

        Ok(Self {
            config,
            forwarder,
            metrics,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Outbound client. No timeout is configured: calls run until the remote
/// answers or the connection fails.
fn create_http_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .user_agent(config.upstream.user_agent.clone())
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_default_config() {
        let state = AppState::new(Config::default()).unwrap();
        assert_eq!(state.config.server.port, 8080);
        assert!(state.uptime_seconds() < 5);
    }
}

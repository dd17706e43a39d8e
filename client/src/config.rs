//! Configuration for the skipvote client
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Result};
use clap::Parser;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::central_config::{load_config, CentralConfig};
use crate::client::ClientConfig;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_host_url() -> String {
    std::env::var("SKIPVOTE_HOST_URL").unwrap_or_else(|_| CENTRAL_CONFIG.server.host_url.clone())
}

fn default_card_number() -> u32 {
    std::env::var("SKIPVOTE_CARD_NUMBER")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(CENTRAL_CONFIG.client.card_number)
}

fn default_update_interval() -> u64 {
    std::env::var("SKIPVOTE_UPDATE_INTERVAL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(CENTRAL_CONFIG.client.update_interval_ms)
}

fn default_request_timeout() -> u64 {
    std::env::var("SKIPVOTE_REQUEST_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(CENTRAL_CONFIG.server.request_timeout_ms)
}

fn default_log_level() -> String {
    std::env::var("SKIPVOTE_LOG_LEVEL").unwrap_or_else(|_| CENTRAL_CONFIG.common.log_level.clone())
}

fn default_health_port() -> u16 {
    std::env::var("SKIPVOTE_HEALTH_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(CENTRAL_CONFIG.health.port)
}

fn default_stale_after() -> u64 {
    std::env::var("SKIPVOTE_STALE_AFTER")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(CENTRAL_CONFIG.health.stale_after_secs)
}

fn default_no_claim() -> bool {
    !CENTRAL_CONFIG.client.claim_on_start
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "skipvote")]
#[command(about = "Vote-to-skip panel client")]
#[command(
    long_about = "Polls the vote server for skip state, relays stop votes and text
submissions, and reloads the panel when the server flags this card.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Base URL of the vote server
    #[arg(long, default_value_t = default_host_url())]
    pub host_url: String,

    /// Player slot (card number) this client represents
    #[arg(long, default_value_t = default_card_number())]
    pub card_number: u32,

    /// Period between stop-state polls in milliseconds
    #[arg(long, default_value_t = default_update_interval())]
    pub update_interval_ms: u64,

    /// Per-request timeout in milliseconds (0 to disable)
    #[arg(long, default_value_t = default_request_timeout())]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Port for the health and metrics server (0 to disable)
    #[arg(long, default_value_t = default_health_port())]
    pub health_port: u16,

    /// Seconds without a successful poll before /health reports unavailable
    #[arg(long, default_value_t = default_stale_after())]
    pub stale_after_secs: u64,

    /// Skip claiming the card slot on startup
    #[arg(long, default_value_t = default_no_claim())]
    pub no_claim: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.host_url.trim().is_empty() {
            return Err(anyhow!("host_url cannot be empty"));
        }

        let url = reqwest::Url::parse(&self.host_url)
            .map_err(|e| anyhow!("invalid host_url '{}': {}", self.host_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!(
                "invalid host_url '{}': scheme must be http or https",
                self.host_url
            ));
        }

        if self.update_interval_ms == 0 {
            return Err(anyhow!("update_interval_ms must be greater than 0"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Settings handed to the polling client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host_url: self.host_url.trim_end_matches('/').to_string(),
            card_number: self.card_number,
            update_interval: self.update_interval(),
        }
    }
}

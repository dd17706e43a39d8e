//! Centralized configuration loading from config.toml.
//!
//! This module provides a single source of truth for configuration values,
//! loaded from config.toml with support for environment variable overrides.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod defaults {
    pub const LOG_LEVEL: &str = "info";
    pub const HOST_URL: &str = "http://localhost:8080";
    pub const REQUEST_TIMEOUT_MS: u64 = 5000;
    pub const CARD_NUMBER: u32 = 0;
    pub const UPDATE_INTERVAL_MS: u64 = 500;
    pub const CLAIM_ON_START: bool = true;
    pub const HEALTH_PORT: u16 = 0;
    pub const STALE_AFTER_SECS: u64 = 30;
}

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub health: HealthConfig,
}

fn d_log_level() -> String {
    defaults::LOG_LEVEL.into()
}
fn d_host_url() -> String {
    defaults::HOST_URL.into()
}
fn d_request_timeout() -> u64 {
    defaults::REQUEST_TIMEOUT_MS
}
fn d_card_number() -> u32 {
    defaults::CARD_NUMBER
}
fn d_update_interval() -> u64 {
    defaults::UPDATE_INTERVAL_MS
}
fn d_claim_on_start() -> bool {
    defaults::CLAIM_ON_START
}
fn d_health_port() -> u16 {
    defaults::HEALTH_PORT
}
fn d_stale_after() -> u64 {
    defaults::STALE_AFTER_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
        }
    }
}

/// Where the vote server lives and how long to wait for it.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "d_host_url")]
    pub host_url: String,
    /// Per-request timeout in milliseconds (0 disables the timeout)
    #[serde(default = "d_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host_url: d_host_url(),
            request_timeout_ms: d_request_timeout(),
        }
    }
}

/// Settings for this client instance (one per player slot).
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSection {
    #[serde(default = "d_card_number")]
    pub card_number: u32,
    #[serde(default = "d_update_interval")]
    pub update_interval_ms: u64,
    #[serde(default = "d_claim_on_start")]
    pub claim_on_start: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            card_number: d_card_number(),
            update_interval_ms: d_update_interval(),
            claim_on_start: d_claim_on_start(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "d_health_port")]
    pub port: u16,
    #[serde(default = "d_stale_after")]
    pub stale_after_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: d_health_port(),
            stale_after_secs: d_stale_after(),
        }
    }
}

/// Standard locations to search for config.toml
const CONFIG_SEARCH_PATHS: &[&str] = &["config.toml", "../config.toml", "/app/config.toml"];

/// Load the central configuration from config.toml.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("SKIPVOTE_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from SKIPVOTE_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "SKIPVOTE_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

fn load_from_path(path: &PathBuf) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u16, u32, u64, bool)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    env_override!(config, common.log_level, "SKIPVOTE_COMMON_LOG_LEVEL");

    env_override!(config, server.host_url, "SKIPVOTE_SERVER_HOST_URL");
    env_override!(
        config,
        server.request_timeout_ms,
        "SKIPVOTE_SERVER_REQUEST_TIMEOUT_MS",
        parse
    );

    env_override!(
        config,
        client.card_number,
        "SKIPVOTE_CLIENT_CARD_NUMBER",
        parse
    );
    env_override!(
        config,
        client.update_interval_ms,
        "SKIPVOTE_CLIENT_UPDATE_INTERVAL_MS",
        parse
    );
    env_override!(
        config,
        client.claim_on_start,
        "SKIPVOTE_CLIENT_CLAIM_ON_START",
        parse
    );

    env_override!(config, health.port, "SKIPVOTE_HEALTH_PORT", parse);
    env_override!(
        config,
        health.stale_after_secs,
        "SKIPVOTE_HEALTH_STALE_AFTER_SECS",
        parse
    );

    config
}

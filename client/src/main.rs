//! skipvote - panel client for vote-to-skip game sessions
//!
//! A long-running process that:
//! 1. Claims its card slot on the vote server
//! 2. Polls `/stopdata` and keeps the panel's stop control and vote text current
//! 3. Clears its refresh flag and reloads when the server asks it to
//! 4. Relays stop votes, text submissions and id release from the console

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod backend;
mod central_config;
mod client;
mod config;
mod console;
mod error;
mod health;
mod metrics;
mod page;
mod reconcile;
mod types;

use crate::backend::HttpBackend;
use crate::client::PollingClient;
use crate::config::Config;
use crate::console::{run_console, spawn_stdin_reader, ConsoleExit};
use crate::health::{start_health_server, HealthState};
use crate::page::{HeadlessPage, Page};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    eprintln!("skipvote client starting...");

    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    metrics::init_metrics();

    let health = HealthState::new();
    if config.health_port != 0 {
        let health_state = health.clone();
        let port = config.health_port;
        let stale_after = config.stale_after_secs;
        tokio::spawn(async move {
            if let Err(e) = start_health_server(port, health_state, stale_after).await {
                error!("Health server failed: {}", e);
            }
        });
    }

    let backend = HttpBackend::new(&config.host_url, config.request_timeout())?;
    let page = Arc::new(HeadlessPage::new(backend.http()));
    let client = Arc::new(PollingClient::new(
        config.client_config(),
        Arc::new(backend),
        Arc::clone(&page) as Arc<dyn Page>,
        health,
    ));

    info!(
        card = config.card_number,
        host = %config.host_url,
        update_interval_ms = config.update_interval_ms,
        "Panel client configured"
    );

    if config.no_claim {
        info!("Skipping card claim (--no-claim)");
    } else {
        client.claim_id().await;
    }

    // Setup graceful shutdown
    let shutdown_client = Arc::clone(&client);
    let shutdown_handle = tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        info!("Shutdown signal received, stopping client...");
        shutdown_client.shutdown();
    });

    let console_client = Arc::clone(&client);
    let console_handle = tokio::spawn(async move {
        let lines = spawn_stdin_reader();
        if run_console(Arc::clone(&console_client), page, lines).await == ConsoleExit::Quit {
            console_client.shutdown();
        }
    });

    Arc::clone(&client).run().await;

    shutdown_handle.abort();
    console_handle.abort();

    info!(
        card = client.card_number(),
        released = client.is_released(),
        "Client stopped"
    );
    Ok(())
}

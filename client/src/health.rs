//! Health check HTTP server.
//!
//! Liveness, readiness and metrics endpoints for whoever supervises the
//! client process.

use axum::{
    http::{header, StatusCode},
    routing::get,
    Router,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::metrics;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared health state between the poll loop and the health server.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Set to true once a poll has succeeded.
    ready: Arc<AtomicBool>,
    /// Set to false when the client can no longer do its job.
    healthy: Arc<AtomicBool>,
    /// Timestamp of the last successful poll (Unix seconds).
    last_poll_time: Arc<AtomicU64>,
    consecutive_failures: Arc<AtomicU64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            healthy: Arc::new(AtomicBool::new(true)),
            last_poll_time: Arc::new(AtomicU64::new(0)),
            consecutive_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_poll_success(&self) {
        self.last_poll_time.store(unix_now(), Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!("First poll succeeded, client marked as ready");
        }
    }

    /// Returns the number of failures in a row, including this one.
    pub fn record_poll_failure(&self) -> u64 {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark the client as unhealthy (e.g. the page released its card).
    pub fn set_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
        warn!("Client marked as unhealthy");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Check that a poll has succeeded within `timeout_secs`.
    pub fn is_making_progress(&self, timeout_secs: u64) -> bool {
        let last = self.last_poll_time.load(Ordering::SeqCst);
        if last == 0 {
            // Nothing has succeeded yet, which is fine during startup
            return true;
        }
        unix_now().saturating_sub(last) < timeout_secs
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the health router. Separated from the server for testing.
pub fn create_health_router(state: HealthState, stale_after_secs: u64) -> Router {
    Router::new()
        .route(
            "/health",
            get({
                let state = state.clone();
                move || health_handler(state.clone(), stale_after_secs)
            }),
        )
        .route(
            "/ready",
            get({
                let state = state.clone();
                move || ready_handler(state.clone())
            }),
        )
        .route("/metrics", get(metrics_handler))
}

/// Start the health check HTTP server on the given port.
pub async fn start_health_server(
    port: u16,
    state: HealthState,
    stale_after_secs: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_health_router(state, stale_after_secs);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Health server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(state: HealthState, stale_after_secs: u64) -> StatusCode {
    if state.is_healthy() && state.is_making_progress(stale_after_secs) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn ready_handler(state: HealthState) -> StatusCode {
    if state.is_ready() && state.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler() -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::encode_metrics(),
    )
}

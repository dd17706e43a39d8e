//! Prometheus metrics for the panel client.
//!
//! Covers poll throughput and failures, page reloads, per-endpoint request
//! outcomes and the last vote state seen from the server.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;

use crate::error::ClientResult;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== Poll Counters ==========

    /// Total stop-state polls issued
    pub static ref POLLS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("skipvote_polls_total", "Total stop-state polls issued")
    ).unwrap();

    /// Polls that ended in an HTTP, transport or decode error
    pub static ref POLL_FAILURES: IntCounter = IntCounter::with_opts(
        Opts::new("skipvote_poll_failures_total", "Stop-state polls that failed")
    ).unwrap();

    /// Poll responses dropped because a later poll was already applied
    pub static ref STALE_POLLS: IntCounter = IntCounter::with_opts(
        Opts::new("skipvote_stale_polls_total", "Poll responses dropped as out of order")
    ).unwrap();

    /// Page reloads triggered by the refresh flag
    pub static ref PAGE_RELOADS: IntCounter = IntCounter::with_opts(
        Opts::new("skipvote_page_reloads_total", "Page reloads triggered by the refresh flag")
    ).unwrap();

    /// Requests by endpoint and outcome (ok, http, transport, decode, url)
    pub static ref REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("skipvote_requests_total", "Requests to the vote server"),
        &["endpoint", "outcome"]
    ).unwrap();

    // ========== Latency ==========

    /// Round trip of one stop-state poll
    pub static ref POLL_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("skipvote_poll_seconds", "Round trip of one stop-state poll")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
    ).unwrap();

    // ========== Vote State ==========

    /// Votes required to skip, as last reported by the server
    pub static ref VOTES_REQUIRED: IntGauge = IntGauge::with_opts(
        Opts::new("skipvote_votes_required", "Votes required to skip the current song")
    ).unwrap();

    /// Votes received so far, as last reported by the server
    pub static ref VOTES_RECEIVED: IntGauge = IntGauge::with_opts(
        Opts::new("skipvote_votes_received", "Skip votes received so far")
    ).unwrap();
}

static INIT: Once = Once::new();

/// Initialize and register all metrics with the registry.
/// Safe to call multiple times - only initializes once.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(POLLS_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(POLL_FAILURES.clone())).unwrap();
        REGISTRY.register(Box::new(STALE_POLLS.clone())).unwrap();
        REGISTRY.register(Box::new(PAGE_RELOADS.clone())).unwrap();
        REGISTRY.register(Box::new(REQUESTS.clone())).unwrap();
        REGISTRY.register(Box::new(POLL_SECONDS.clone())).unwrap();
        REGISTRY.register(Box::new(VOTES_REQUIRED.clone())).unwrap();
        REGISTRY.register(Box::new(VOTES_RECEIVED.clone())).unwrap();
    });
}

/// Count one request to `endpoint` under its outcome label.
pub fn record_request<T>(endpoint: &str, result: &ClientResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    REQUESTS.with_label_values(&[endpoint, outcome]).inc();
}

/// Publish the vote state from the latest applied poll.
pub fn record_vote_state(votes_required: u32, votes_received: usize) {
    VOTES_REQUIRED.set(i64::from(votes_required));
    VOTES_RECEIVED.set(votes_received as i64);
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}\n", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

//! The polling client: keeps one panel in step with the server's skip-vote
//! state and relays the player's actions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::health::HealthState;
use crate::metrics;
use crate::page::Page;
use crate::reconcile::reconcile;
use crate::types::{ClearRefreshPayload, StopRequestPayload, SubmissionPayload};

pub const SUBMIT_ERROR_MESSAGE: &str = "Error submitting data.";
pub const BACK_NAVIGATION_MESSAGE: &str = "Back navigation is disabled!";
pub const RELEASE_PATH: &str = "/rel";

/// Settings for one panel instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the vote server, without a trailing slash
    pub host_url: String,
    /// Player slot this panel represents
    pub card_number: u32,
    /// Period between stop-state polls
    pub update_interval: Duration,
}

impl ClientConfig {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host_url, path)
    }
}

/// What became of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The response was written to the page.
    Applied { reloaded: bool },
    /// A poll issued later had already been applied; this response was dropped.
    Stale,
    /// The request or its decoding failed; the page was left alone.
    Failed,
}

pub struct PollingClient {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    page: Arc<dyn Page>,
    health: HealthState,
    /// Sequence number handed to the next poll
    next_poll: AtomicU64,
    /// Sequence number of the newest poll written to the page
    last_applied: Mutex<u64>,
    /// A clear-and-reload is in flight
    reloading: AtomicBool,
    released: AtomicBool,
    shutdown_signal: AtomicBool,
}

impl PollingClient {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        page: Arc<dyn Page>,
        health: HealthState,
    ) -> Self {
        Self {
            config,
            backend,
            page,
            health,
            next_poll: AtomicU64::new(0),
            last_applied: Mutex::new(0),
            reloading: AtomicBool::new(false),
            released: AtomicBool::new(false),
            shutdown_signal: AtomicBool::new(false),
        }
    }

    pub fn card_number(&self) -> u32 {
        self.config.card_number
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Send the input text to the server. Only failures are shown.
    pub async fn submit_text(&self) {
        let payload = SubmissionPayload {
            text: self.page.input_value(),
        };

        match self.backend.submit(&payload).await {
            Ok(_) => debug!(chars = payload.text.len(), "Text submitted"),
            Err(e) => {
                error!(error = %e, "Error posting data");
                self.page.set_response_message(SUBMIT_ERROR_MESSAGE);
            }
        }
    }

    /// Cast this card's vote to skip the current song.
    pub async fn request_stop(&self) {
        match self.backend.request_stop(&StopRequestPayload::default()).await {
            Ok(_) => info!(card = self.config.card_number, "Stop requested"),
            Err(e) => {
                error!(error = %e, "Error posting stop request");
                self.page
                    .set_response_message(&format!("Error submitting data: {}", e));
            }
        }
    }

    /// Fetch the stop state and bring the page in line with it.
    ///
    /// If the server flags this card for refresh, the flag is cleared on the
    /// server before the page reloads. Only one clear-and-reload runs at a
    /// time, and none once the card has been released.
    pub async fn poll_stop_state(&self) -> PollOutcome {
        let seq = self.next_poll.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::POLLS_TOTAL.inc();

        let timer = metrics::POLL_SECONDS.start_timer();
        let result = self.backend.stop_data().await;
        timer.observe_duration();

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                metrics::POLL_FAILURES.inc();
                let failures = self.health.record_poll_failure();
                warn!(seq, failures, error = %e, "Stop-state poll failed");
                return PollOutcome::Failed;
            }
        };

        let view = reconcile(&state, self.config.card_number);
        {
            let mut last_applied = self
                .last_applied
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *last_applied > seq {
                metrics::STALE_POLLS.inc();
                debug!(seq, newest = *last_applied, "Dropping out-of-order poll response");
                return PollOutcome::Stale;
            }
            *last_applied = seq;
            view.apply(self.page.as_ref());
        }

        self.health.record_poll_success();
        metrics::record_vote_state(state.votes_required(), state.votes_received());
        debug!(
            seq,
            votes_required = state.votes_required(),
            votes_received = state.votes_received(),
            "Applied stop state"
        );

        if !view.reload {
            return PollOutcome::Applied { reloaded: false };
        }
        if self.is_released() {
            debug!(seq, "Card released, ignoring refresh flag");
            return PollOutcome::Applied { reloaded: false };
        }
        if self.reloading.swap(true, Ordering::SeqCst) {
            debug!(seq, "Reload already in progress");
            return PollOutcome::Applied { reloaded: false };
        }

        self.refresh_page().await;
        self.reloading.store(false, Ordering::SeqCst);
        PollOutcome::Applied { reloaded: true }
    }

    /// Clear this card's refresh flag, then reload. The reload waits for the
    /// clear to finish and happens whether or not it succeeded.
    async fn refresh_page(&self) {
        let card = self.config.card_number;
        info!(card, "Refresh requested by server");

        let payload = ClearRefreshPayload { player_nbr: card };
        match self.backend.clear_refresh(&payload).await {
            Ok(()) => debug!(card, "Refresh flag cleared"),
            Err(e) => warn!(card, error = %e, "Failed to clear refresh flag, reloading anyway"),
        }

        metrics::PAGE_RELOADS.inc();
        self.page.reload().await;
    }

    /// Claim this card's slot. The server answers with a session cookie that
    /// identifies the player on later requests.
    pub async fn claim_id(&self) {
        let card = self.config.card_number;
        info!(card, "Claiming id");
        self.page.navigate(&self.config.url(&format!("/{}", card))).await;
    }

    /// Give the card back and leave the panel.
    pub async fn release_id(&self) {
        info!(card = self.config.card_number, "Releasing id");
        self.released.store(true, Ordering::SeqCst);
        self.health.set_unhealthy();
        self.page.navigate(&self.config.url(RELEASE_PATH)).await;
    }

    /// Keep the panel where it is when the player tries to go back.
    pub fn handle_back_navigation(&self) {
        self.page.pin_history();
        self.page.alert(BACK_NAVIGATION_MESSAGE);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Poll every `update_interval` until shut down or released.
    ///
    /// Each tick spawns its own poll, so a slow round trip does not hold back
    /// the next one; out-of-order responses are dropped by sequence number.
    pub async fn run(self: Arc<Self>) {
        info!(
            card = self.config.card_number,
            host = %self.config.host_url,
            interval_ms = self.config.update_interval.as_millis() as u64,
            "Starting stop-state polling"
        );

        let mut ticker = interval(self.config.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.shutdown_signal.load(Ordering::SeqCst) {
                info!("Shutdown signal received, stopping polling");
                break;
            }
            if self.is_released() {
                info!("Card released, stopping polling");
                break;
            }

            let client = Arc::clone(&self);
            tokio::spawn(async move {
                client.poll_stop_state().await;
            });
        }
    }

    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::SeqCst);
        info!("Shutdown signal set");
    }
}

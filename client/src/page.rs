//! The panel the client drives.
//!
//! [`Page`] is the set of bindings the polling client reads and writes: the
//! text input, the stop and decision controls, the two status lines, and the
//! page-level actions (reload, navigate, history pin, alert).
//! [`HeadlessPage`] keeps that state in memory for terminal sessions and
//! performs reloads and navigations as plain GET requests.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[async_trait]
pub trait Page: Send + Sync {
    /// Current value of the text input.
    fn input_value(&self) -> String;

    fn set_stop_visible(&self, visible: bool);

    /// Enable or disable the decision (winner claim) control.
    fn set_decision_enabled(&self, enabled: bool);

    fn set_response_message(&self, text: &str);

    fn set_votes_required_text(&self, text: &str);

    /// Reload the current document.
    async fn reload(&self);

    /// Leave the current document for `url`.
    async fn navigate(&self, url: &str);

    /// Re-push the current history entry so back navigation stays put.
    fn pin_history(&self);

    fn alert(&self, message: &str);
}

/// Snapshot of everything a [`HeadlessPage`] displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub input: String,
    pub stop_visible: bool,
    pub decision_enabled: bool,
    pub response_message: String,
    pub votes_required_text: String,
    pub location: Option<String>,
    pub reloads: u64,
    pub history_depth: u32,
}

/// In-memory [`Page`] that logs what a browser would render.
pub struct HeadlessPage {
    http: Client,
    state: Mutex<PanelState>,
}

impl HeadlessPage {
    /// `http` should share its cookie store with the backend so navigations
    /// carry the same session.
    pub fn new(http: Client) -> Self {
        Self {
            http,
            state: Mutex::new(PanelState::default()),
        }
    }

    pub fn set_input(&self, text: &str) {
        self.lock().input = text.to_string();
    }

    pub fn snapshot(&self) -> PanelState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch(&self, url: &str) {
        match self.http.get(url).send().await {
            Ok(response) => debug!(%url, status = response.status().as_u16(), "Loaded page"),
            Err(e) => warn!(%url, error = %e, "Failed to load page"),
        }
    }
}

#[async_trait]
impl Page for HeadlessPage {
    fn input_value(&self) -> String {
        self.lock().input.clone()
    }

    fn set_stop_visible(&self, visible: bool) {
        let mut state = self.lock();
        if state.stop_visible != visible {
            debug!(visible, "Stop control visibility changed");
            state.stop_visible = visible;
        }
    }

    fn set_decision_enabled(&self, enabled: bool) {
        self.lock().decision_enabled = enabled;
    }

    fn set_response_message(&self, text: &str) {
        let mut state = self.lock();
        if state.response_message != text {
            if !text.is_empty() {
                info!("{}", text);
            }
            state.response_message = text.to_string();
        }
    }

    fn set_votes_required_text(&self, text: &str) {
        let mut state = self.lock();
        if state.votes_required_text != text {
            if !text.is_empty() {
                info!("{}", text);
            }
            state.votes_required_text = text.to_string();
        }
    }

    async fn reload(&self) {
        let location = {
            let mut state = self.lock();
            let location = state.location.clone();
            // A reload starts the document over; the next poll repaints it.
            *state = PanelState {
                location: location.clone(),
                reloads: state.reloads + 1,
                history_depth: state.history_depth,
                ..PanelState::default()
            };
            location
        };
        info!("Reloading page");
        if let Some(url) = location {
            self.fetch(&url).await;
        }
    }

    async fn navigate(&self, url: &str) {
        info!(%url, "Navigating");
        self.lock().location = Some(url.to_string());
        self.fetch(url).await;
    }

    fn pin_history(&self) {
        self.lock().history_depth += 1;
    }

    fn alert(&self, message: &str) {
        warn!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{dead_url, spawn_server};
    use axum::{routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn setters_update_snapshot() {
        let page = HeadlessPage::new(Client::new());
        page.set_input("hello");
        page.set_stop_visible(true);
        page.set_decision_enabled(true);
        page.set_response_message("Votes received so far: 1");
        page.set_votes_required_text("Votes needed to skip to next song: 2");

        let state = page.snapshot();
        assert_eq!(page.input_value(), "hello");
        assert!(state.stop_visible);
        assert!(state.decision_enabled);
        assert_eq!(state.response_message, "Votes received so far: 1");
        assert_eq!(state.votes_required_text, "Votes needed to skip to next song: 2");
    }

    #[tokio::test]
    async fn navigate_then_reload_refetches_location() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/card",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "card"
                }
            }),
        );
        let base = spawn_server(router).await;
        let page = HeadlessPage::new(Client::new());
        let url = format!("{base}/card");

        page.navigate(&url).await;
        page.set_stop_visible(true);
        page.set_response_message("stale");
        page.reload().await;

        let state = page.snapshot();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(state.location.as_deref(), Some(url.as_str()));
        assert_eq!(state.reloads, 1);
        assert!(!state.stop_visible);
        assert!(state.response_message.is_empty());
    }

    #[tokio::test]
    async fn navigation_failure_is_logged_not_fatal() {
        let page = HeadlessPage::new(Client::new());
        let url = format!("{}/rel", dead_url().await);

        page.navigate(&url).await;

        assert_eq!(page.snapshot().location, Some(url));
    }

    #[test]
    fn pin_history_counts_entries() {
        let page = HeadlessPage::new(Client::new());
        page.pin_history();
        page.pin_history();
        assert_eq!(page.snapshot().history_depth, 2);
    }
}

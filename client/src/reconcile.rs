//! Maps one stop-state response onto what the panel should show.
//!
//! The view is recomputed from scratch on every poll; nothing carries over
//! between responses.

use crate::page::Page;
use crate::types::StopStateResponse;

pub const NO_VOTES_MESSAGE: &str = "No one has voted to skip this song so far";

/// Everything one poll decides about the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub stop_visible: bool,
    pub decision_enabled: bool,
    pub votes_required_text: String,
    pub response_message: String,
    /// The server flagged this card for a forced reload.
    pub reload: bool,
}

pub fn reconcile(state: &StopStateResponse, card_number: u32) -> PageView {
    let votes_required = state.votes_required();
    let reload = state.refresh_screen.is_set(card_number);

    if votes_required == 0 {
        return PageView {
            stop_visible: false,
            decision_enabled: true,
            votes_required_text: String::new(),
            response_message: String::new(),
            reload,
        };
    }

    let response_message = match state.votes_received() {
        0 => NO_VOTES_MESSAGE.to_string(),
        n => format!("Votes received so far: {}", n),
    };

    PageView {
        stop_visible: true,
        decision_enabled: true,
        votes_required_text: format!("Votes needed to skip to next song: {}", votes_required),
        response_message,
        reload,
    }
}

impl PageView {
    /// Write the view to the page. The reload flag is left to the caller,
    /// which must clear it on the server first.
    pub fn apply(&self, page: &dyn Page) {
        page.set_stop_visible(self.stop_visible);
        page.set_decision_enabled(self.decision_enabled);
        page.set_votes_required_text(&self.votes_required_text);
        page.set_response_message(&self.response_message);
    }
}

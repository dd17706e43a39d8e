//! Request bodies sent to the vote server.

use serde::Serialize;

/// Body for `/submit`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub text: String,
}

/// Body for `/requeststop` and `/stopdata`. The text is always empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopRequestPayload {
    pub text: String,
}

/// Body for `/clear_refresh`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClearRefreshPayload {
    pub player_nbr: u32,
}

//! Errors raised while talking to the vote server.

use thiserror::Error;

/// Failures of a single request to the vote server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("HTTP error! Status: {status}")]
    Http { status: u16 },

    /// Connect, timeout or I/O failure before a response was read.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body was not the JSON shape the endpoint promises.
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Http { .. } => "http",
            ClientError::Transport(_) => "transport",
            ClientError::Decode(_) => "decode",
            ClientError::InvalidUrl(_) => "url",
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

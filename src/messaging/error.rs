use std::time::Duration;

// ============================================================================
// Transport Errors
// ============================================================================
//
// Network failures and non-2xx responses on snapshot/poll/ack/stream calls.
// Always logged and survived; the next tick or reconnect is the retry.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid bridge url: {0}")]
    InvalidUrl(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("command stream closed by server")]
    StreamClosed,

    #[error("command stream idle for {0:?}")]
    StreamIdle(Duration),
}

impl TransportError {
    /// Build a status error, keeping only a short preview of the body.
    pub fn status(status: u16, body: &str) -> Self {
        TransportError::Status {
            status,
            body: body.chars().take(300).collect(),
        }
    }
}

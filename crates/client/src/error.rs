//! Error types for the client crate

use thiserror::Error;

/// Errors raised by the WebSocket transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Rejections and failures of user-facing client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Not connected to the server, try again shortly")]
    NotConnected,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Still waiting for the previous response")]
    AwaitingResponse,

    #[error("Select a project before sending messages")]
    ProjectIdRequired,

    #[error("A session is already being created")]
    CreateInProgress,

    #[error("No project id change to confirm")]
    NothingToConfirm,

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Client task has stopped")]
    ChannelClosed,
}

/// Errors from the REST API client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("API key not found (set {0})")]
    MissingCredential(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Connection closed")]
    Closed,
}

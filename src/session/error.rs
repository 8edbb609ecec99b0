use thiserror::Error;

use crate::audio::AudioError;
use crate::live::LiveError;

/// Setup failures of [`LiveSession::connect`](super::LiveSession::connect)
///
/// When one of these is returned nothing acquired during setup is still held.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Microphone unavailable: {0}")]
    Microphone(#[source] AudioError),

    #[error("Audio output unavailable: {0}")]
    Output(#[source] AudioError),

    #[error("Realtime service rejected the session: {0}")]
    HandshakeRejected(String),

    #[error("Realtime service did not accept the session within {0}s")]
    HandshakeTimeout(u64),

    #[error("Failed to reach the realtime service: {0}")]
    Transport(#[source] LiveError),
}

impl From<LiveError> for BridgeError {
    fn from(err: LiveError) -> Self {
        match err {
            LiveError::MissingCredential(var) => BridgeError::MissingCredential(var),
            other => BridgeError::Transport(other),
        }
    }
}

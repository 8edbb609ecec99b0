//! Live session management
//!
//! This module provides the `LiveSession` bridge that manages:
//! - Output clock acquisition and gapless playback of synthesized speech
//! - The bidirectional stream to the realtime dialogue service
//! - Microphone capture, resampling and upstream encoding
//! - Tool invocation dispatch and correlated responses
//! - Connection state, level meters and session statistics

mod config;
mod error;
mod inbound;
mod session;
mod stats;

pub use config::SessionConfig;
pub use error::BridgeError;
pub use session::LiveSession;
pub use stats::{ConnectionState, SessionCounters, SessionStats};

//! HTTP API for the verification dashboard
//!
//! This module provides a REST API for controlling the voice session:
//! - POST /session/connect - Connect and start streaming
//! - POST /session/disconnect - Close the session
//! - POST /session/mic - Mute or unmute the microphone
//! - POST /session/output - Pause or resume playback
//! - GET /session - Connection state, counters and audio levels
//! - GET /flow - Verification dialogue progress
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::LevelReading;

/// Lifecycle of a session's connection to the realtime service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Open,
    Closed,
}

/// Traffic counters shared by the session's tasks
#[derive(Debug, Default)]
pub struct SessionCounters {
    /// Shared with the capture pipeline
    pub blocks_sent: Arc<AtomicUsize>,
    pub chunks_played: AtomicUsize,
    pub chunks_dropped: AtomicUsize,
    pub tool_calls_handled: AtomicUsize,
}

impl SessionCounters {
    pub fn reset(&self) {
        self.blocks_sent.store(0, Ordering::Relaxed);
        self.chunks_played.store(0, Ordering::Relaxed);
        self.chunks_dropped.store(0, Ordering::Relaxed);
        self.tool_calls_handled.store(0, Ordering::Relaxed);
    }
}

/// Statistics about a live session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    pub connection: ConnectionState,

    /// When the current connection was established
    pub connected_at: Option<DateTime<Utc>>,

    /// Time since `connected_at` in seconds
    pub duration_secs: f64,

    /// Capture blocks sent to the service
    pub blocks_sent: usize,

    /// Synthesized speech chunks scheduled for playback
    pub chunks_played: usize,

    /// Inbound audio chunks dropped as malformed or unplayable
    pub chunks_dropped: usize,

    pub tool_calls_handled: usize,

    pub mic_muted: bool,

    pub output_paused: bool,

    pub input_level: LevelReading,

    pub output_level: LevelReading,
}

// Gapless playback of synthesized speech chunks
//
// Chunks arrive at network pace. Each one is scheduled to start exactly where
// the previous one ends on the output clock, unless the clock already passed
// that point (underrun), in which case it starts now.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::AudioOutput;
use super::codec::decode_float_payload;
use super::meter::LevelMeter;

/// Output clock time at which the next queued chunk should begin
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackCursor {
    next_start: f64,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(time: f64) -> Self {
        Self { next_start: time }
    }

    pub fn position(&self) -> f64 {
        self.next_start
    }

    /// Start time for a chunk read against the clock at `now`
    ///
    /// Snaps the cursor forward when the clock overtook it.
    pub fn start_for(&mut self, now: f64) -> f64 {
        if self.next_start < now {
            self.next_start = now;
        }
        self.next_start
    }

    /// Advance past a chunk of `duration` seconds scheduled at `start`
    pub fn commit(&mut self, start: f64, duration: f64) {
        self.next_start = start + duration;
    }

    /// `start_for` followed by `commit`
    pub fn reserve(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.start_for(now);
        self.commit(start, duration);
        start
    }
}

/// Where a chunk landed on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub start: f64,
    pub duration: f64,
    pub samples: usize,
}

pub struct PlaybackScheduler {
    output: Arc<dyn AudioOutput>,
    cursor: PlaybackCursor,
    meter: Arc<LevelMeter>,
    /// Set while the user has paused output; suspends are then left alone
    paused: Arc<AtomicBool>,
}

impl PlaybackScheduler {
    pub fn new(output: Arc<dyn AudioOutput>, meter: Arc<LevelMeter>, paused: Arc<AtomicBool>) -> Self {
        Self {
            output,
            cursor: PlaybackCursor::new(),
            meter,
            paused,
        }
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Decode one transport-encoded PCM16 chunk and queue it for playback
    ///
    /// Returns `None` when the chunk was dropped; the cursor is left untouched
    /// in that case.
    pub async fn enqueue(&mut self, payload: &str, sample_rate: u32) -> Option<ScheduledChunk> {
        if self.output.is_suspended() && !self.paused.load(Ordering::SeqCst) {
            if let Err(e) = self.output.resume().await {
                warn!("Failed to resume output clock: {}", e);
            }
        }

        let samples = match decode_float_payload(payload) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Dropping malformed audio chunk: {}", e);
                return None;
            }
        };

        if samples.is_empty() || sample_rate == 0 {
            debug!("Skipping empty audio chunk");
            return None;
        }

        let duration = samples.len() as f64 / sample_rate as f64;
        let sample_count = samples.len();
        self.meter.observe(&samples);

        let now = self.output.current_time();
        let start = self.cursor.start_for(now);

        if let Err(e) = self.output.schedule(samples, sample_rate, start) {
            warn!("Failed to schedule audio chunk: {}", e);
            return None;
        }
        self.cursor.commit(start, duration);

        debug!(
            "Scheduled {} samples at {:.3}s (now {:.3}s, next {:.3}s)",
            sample_count,
            start,
            now,
            self.cursor.position()
        );

        Some(ScheduledChunk {
            start,
            duration,
            samples: sample_count,
        })
    }
}

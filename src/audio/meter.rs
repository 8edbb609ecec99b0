use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// Live audio level for visualization
///
/// Values are stored as f32 bits so readers never block the audio path.
#[derive(Debug, Default)]
pub struct LevelMeter {
    rms: AtomicU32,
    peak: AtomicU32,
}

/// Point-in-time reading of a [`LevelMeter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LevelReading {
    pub rms: f32,
    pub peak: f32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the level of a block of normalized samples
    pub fn observe(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let (sum_sq, peak) = samples.iter().fold((0.0f64, 0.0f32), |(sum, peak), &s| {
            (sum + (s as f64) * (s as f64), peak.max(s.abs()))
        });
        let rms = (sum_sq / samples.len() as f64).sqrt() as f32;

        self.rms.store(rms.to_bits(), Ordering::Relaxed);
        self.peak.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn reading(&self) -> LevelReading {
        LevelReading {
            rms: f32::from_bits(self.rms.load(Ordering::Relaxed)),
            peak: f32::from_bits(self.peak.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.rms.store(0f32.to_bits(), Ordering::Relaxed);
        self.peak.store(0f32.to_bits(), Ordering::Relaxed);
    }
}

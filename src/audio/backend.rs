use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::AudioError;

/// One capture callback's worth of mono microphone input
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Normalized samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (the device's native rate)
    pub sample_rate: u32,
}

impl AudioBlock {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for audio backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Samples per capture block
    pub block_size: usize,
    /// Rate of the audio the output clock plays (synthesized speech)
    pub output_sample_rate: u32,
    /// Capacity of the capture block channel
    pub channel_capacity: usize,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            output_sample_rate: 24000,
            channel_capacity: 32,
        }
    }
}

/// Microphone capture backend
///
/// Implementations:
/// - cpal: default input device of the host
/// - in-memory fakes for tests
#[async_trait::async_trait]
pub trait MicrophoneBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that will receive fixed-size blocks
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, AudioError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), AudioError>;

    /// Enable or disable the track; a disabled track keeps delivering silent blocks
    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Native sample rate of the captured blocks
    fn sample_rate(&self) -> u32;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Output device driven by a real-time clock
///
/// Time is expressed in seconds since the device was opened and only advances
/// while the clock is running.
#[async_trait::async_trait]
pub trait AudioOutput: Send + Sync {
    /// Current position of the output clock
    fn current_time(&self) -> f64;

    fn is_suspended(&self) -> bool;

    async fn resume(&self) -> Result<(), AudioError>;

    async fn suspend(&self) -> Result<(), AudioError>;

    /// Queue mono samples to start playing at `start_at` on the output clock
    fn schedule(&self, samples: Vec<f32>, sample_rate: u32, start_at: f64) -> Result<(), AudioError>;

    /// Release the device; scheduled audio is discarded
    async fn close(&self) -> Result<(), AudioError>;

    fn name(&self) -> &str;
}

/// Creates the platform devices a session needs
pub trait AudioBackendFactory: Send + Sync {
    fn create_output(&self, config: &AudioBackendConfig) -> Result<Arc<dyn AudioOutput>, AudioError>;

    fn create_microphone(
        &self,
        config: &AudioBackendConfig,
    ) -> Result<Box<dyn MicrophoneBackend>, AudioError>;
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioBackendConfig;

/// Configuration for a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier, used in logs
    pub session_id: String,

    /// Model identifier sent in the setup message
    pub model: String,

    /// Prebuilt voice for synthesized speech
    pub voice: String,

    /// Rate of the PCM16 audio sent upstream (the service expects 16kHz)
    pub input_sample_rate: u32,

    /// Rate of the synthesized audio received from the service
    pub output_sample_rate: u32,

    /// Microphone samples per capture block
    pub capture_block_size: usize,

    /// Capacity of internal audio and message channels
    pub channel_capacity: usize,

    /// How long to wait for the service to accept the setup
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            model: "models/gemini-2.0-flash-exp".to_string(),
            voice: "Puck".to_string(),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            capture_block_size: 4096,
            channel_capacity: 64,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            block_size: self.capture_block_size,
            output_sample_rate: self.output_sample_rate,
            channel_capacity: self.channel_capacity,
        }
    }
}

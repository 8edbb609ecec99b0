pub mod backend;
pub mod capture;
pub mod codec;
pub mod cpal_backend;
pub mod error;
pub mod meter;
pub mod playback;
pub mod resample;

pub use backend::{AudioBackendConfig, AudioBackendFactory, AudioBlock, AudioOutput, MicrophoneBackend};
pub use capture::CapturePipeline;
pub use codec::CodecError;
pub use cpal_backend::{CpalBackendFactory, CpalMicrophone, CpalOutput};
pub use error::AudioError;
pub use meter::{LevelMeter, LevelReading};
pub use playback::{PlaybackCursor, PlaybackScheduler, ScheduledChunk};
pub use resample::resample;

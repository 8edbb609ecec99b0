use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No microphone found. Please check your system audio settings.")]
    NoMicrophoneFound,

    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    #[error("Failed to start audio stream: {0}")]
    StreamStartFailed(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio clock control failed: {0}")]
    ClockControl(String),

    #[error("Audio device is closed")]
    Closed,

    #[error("Already capturing")]
    AlreadyCapturing,
}

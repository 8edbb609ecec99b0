pub mod audio;
pub mod config;
pub mod flow;
pub mod http;
pub mod live;
pub mod session;
pub mod tools;

pub use audio::{
    AudioBackendConfig, AudioBackendFactory, AudioBlock, AudioOutput, CpalBackendFactory,
    LevelMeter, LevelReading, MicrophoneBackend, PlaybackCursor,
};
pub use config::Config;
pub use flow::{FlowSnapshot, Phase, VerificationFlow, VerificationOutcome};
pub use http::{create_router, AppState};
pub use live::{LiveConnector, LiveEvent, WebSocketConnector};
pub use session::{BridgeError, ConnectionState, LiveSession, SessionConfig, SessionStats};
pub use tools::{ToolDispatcher, VerificationCallbacks};

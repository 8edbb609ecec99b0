pub mod client;
pub mod error;
pub mod messages;
pub mod setup;

pub use client::{LiveChannel, LiveConnector, WebSocketConnector};
pub use error::LiveError;
pub use messages::{
    Blob, ClientMessage, FunctionCall, FunctionResponse, LiveEvent, ServerContent, ServerMessage,
    Setup, ToolCall, ToolResponse,
};
pub use setup::{build_setup, SYSTEM_INSTRUCTION};

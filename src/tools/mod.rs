//! Tool invocations from the remote model
//!
//! Declarations advertised in the session setup, the callback interface the
//! surrounding application implements, and the dispatcher that turns
//! invocations into correlated responses.

mod callbacks;
mod declarations;
mod dispatcher;

pub use callbacks::VerificationCallbacks;
pub use declarations::{function_declarations, ToolKind};
pub use dispatcher::{ToolDispatcher, ToolHandler};

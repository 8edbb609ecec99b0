use crate::flow::VerificationFlow;
use crate::session::LiveSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The voice session driven by the dashboard
    pub session: Arc<LiveSession>,
    /// Dialogue progress fed by the session's tool calls
    pub flow: Arc<VerificationFlow>,
}

impl AppState {
    pub fn new(session: Arc<LiveSession>, flow: Arc<VerificationFlow>) -> Self {
        Self { session, flow }
    }
}

use anyhow::Result;

use crate::flow::{AadharDetails, PanDetails, VerificationOutcome};

/// Application hooks invoked by the tool dispatcher
///
/// The save and create hooks are synchronous state mutators; verification is
/// asynchronous and its outcome is awaited before the tool response is built.
#[async_trait::async_trait]
pub trait VerificationCallbacks: Send + Sync {
    fn on_save_aadhar(&self, details: AadharDetails) -> Result<()>;

    fn on_save_pan(&self, details: PanDetails) -> Result<()>;

    async fn on_verify_details(&self, action: &str) -> Result<VerificationOutcome>;

    fn on_create_digilocker(&self, pin: &str) -> Result<()>;
}

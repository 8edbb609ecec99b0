use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use super::error::FlowError;
use super::matcher::DocumentMatcher;
use super::state::{
    AadharDetails, AccountRecord, FlowSnapshot, PanDetails, Phase, VerificationOutcome,
};
use crate::tools::VerificationCallbacks;

/// State machine behind the verification dialogue
///
/// Tool callbacks mutate the state; observers follow it through
/// [`VerificationFlow::subscribe`].
pub struct VerificationFlow {
    state: watch::Sender<FlowSnapshot>,
    matcher: Arc<dyn DocumentMatcher>,
    verification_delay: Duration,
}

impl VerificationFlow {
    pub fn new(matcher: Arc<dyn DocumentMatcher>, verification_delay: Duration) -> Self {
        let (state, _) = watch::channel(FlowSnapshot::default());
        Self {
            state,
            matcher,
            verification_delay,
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.state.subscribe()
    }

    /// Start over from the Aadhar step
    pub fn reset(&self) {
        self.state.send_replace(FlowSnapshot::default());
        info!("Verification flow reset");
    }

    fn update<R>(&self, f: impl FnOnce(&mut FlowSnapshot) -> Result<R, FlowError>) -> Result<R, FlowError> {
        let mut result = None;
        self.state.send_if_modified(|snapshot| {
            let outcome = f(snapshot);
            let modified = outcome.is_ok();
            if modified {
                snapshot.updated_at = Utc::now();
            }
            result = Some(outcome);
            modified
        });
        result.unwrap_or(Err(FlowError::AlreadyComplete))
    }

    fn next_phase(snapshot: &FlowSnapshot) -> Phase {
        match (&snapshot.aadhar, &snapshot.pan) {
            (None, _) => Phase::Aadhar,
            (Some(_), None) => Phase::Pan,
            (Some(_), Some(_)) => Phase::Verification,
        }
    }

    fn ensure_open(snapshot: &FlowSnapshot) -> Result<(), FlowError> {
        if snapshot.phase == Phase::Complete {
            return Err(FlowError::AlreadyComplete);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VerificationCallbacks for VerificationFlow {
    fn on_save_aadhar(&self, details: AadharDetails) -> Result<()> {
        let details = details.normalized()?;
        info!("Aadhar details saved ({})", details.masked_number());

        self.update(|snapshot| {
            Self::ensure_open(snapshot)?;
            snapshot.aadhar = Some(details);
            snapshot.verification = None;
            snapshot.phase = Self::next_phase(snapshot);
            Ok(())
        })?;
        Ok(())
    }

    fn on_save_pan(&self, details: PanDetails) -> Result<()> {
        let details = details.normalized()?;
        info!("PAN details saved ({})", details.masked_number());

        self.update(|snapshot| {
            Self::ensure_open(snapshot)?;
            snapshot.pan = Some(details);
            snapshot.verification = None;
            snapshot.phase = Self::next_phase(snapshot);
            Ok(())
        })?;
        Ok(())
    }

    async fn on_verify_details(&self, action: &str) -> Result<VerificationOutcome> {
        let (aadhar, pan) = self.update(|snapshot| {
            Self::ensure_open(snapshot)?;
            let (Some(aadhar), Some(pan)) = (snapshot.aadhar.clone(), snapshot.pan.clone()) else {
                return Err(FlowError::MissingDocuments);
            };
            snapshot.phase = Phase::Verification;
            snapshot.verification = Some(VerificationOutcome::Pending);
            Ok((aadhar, pan))
        })?;

        info!("Verifying documents (action: {})", action);
        if !self.verification_delay.is_zero() {
            tokio::time::sleep(self.verification_delay).await;
        }

        let outcome = self.matcher.compare(&aadhar, &pan);
        info!("Verification result: {:?}", outcome);

        self.update(|snapshot| {
            snapshot.verification = Some(outcome);
            if outcome == VerificationOutcome::Match {
                snapshot.phase = Phase::Account;
            }
            Ok(())
        })?;

        Ok(outcome)
    }

    fn on_create_digilocker(&self, pin: &str) -> Result<()> {
        let pin = pin.trim();
        if pin.len() != 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowError::InvalidField {
                field: "pin",
                reason: "PIN must be exactly 6 digits".to_string(),
            }
            .into());
        }

        self.update(|snapshot| {
            Self::ensure_open(snapshot)?;
            if snapshot.verification != Some(VerificationOutcome::Match) {
                return Err(FlowError::NotVerified);
            }
            snapshot.account = Some(AccountRecord {
                created_at: Utc::now(),
            });
            snapshot.phase = Phase::Complete;
            Ok(())
        })?;

        info!("DigiLocker account created");
        Ok(())
    }
}

//! Verification dialogue state
//!
//! Tracks which step of the scripted dialogue the user is on:
//! - Aadhar details collected
//! - PAN details collected
//! - Cross-verification of both documents
//! - DigiLocker account creation

mod error;
mod matcher;
mod state;
mod verifier;

pub use error::FlowError;
pub use matcher::{DocumentMatcher, FixedOutcomeMatcher, NameAndDobMatcher};
pub use state::{
    parse_dob, AadharDetails, AccountRecord, FlowSnapshot, PanDetails, Phase, VerificationOutcome,
};
pub use verifier::VerificationFlow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::error::FlowError;

/// Step of the verification dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Aadhar,
    Pan,
    Verification,
    Account,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationOutcome {
    Match,
    Mismatch,
    Pending,
}

/// Aadhar card fields as collected by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AadharDetails {
    pub full_name: String,
    pub number: String,
    pub dob: String,
}

/// PAN card fields as collected by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanDetails {
    pub full_name: String,
    pub number: String,
    pub dob: String,
}

/// Date formats accepted when reading a date of birth back
const DOB_FORMATS: [&str; 3] = ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"];

pub fn parse_dob(dob: &str) -> Option<NaiveDate> {
    let dob = dob.trim();
    DOB_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(dob, format).ok())
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn require_name(name: &str) -> Result<String, FlowError> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(FlowError::InvalidField {
            field: "fullName",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(name)
}

impl AadharDetails {
    /// Validate and normalize: 12-digit number, DD-MM-YYYY date of birth
    pub fn normalized(self) -> Result<Self, FlowError> {
        let full_name = require_name(&self.full_name)?;

        let number = strip_separators(&self.number);
        if number.len() != 12 || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowError::InvalidField {
                field: "number",
                reason: "Aadhar number must be exactly 12 digits".to_string(),
            });
        }

        let dob = NaiveDate::parse_from_str(self.dob.trim(), "%d-%m-%Y").map_err(|_| {
            FlowError::InvalidField {
                field: "dob",
                reason: format!("'{}' is not a DD-MM-YYYY date", self.dob.trim()),
            }
        })?;

        Ok(Self {
            full_name,
            number,
            dob: dob.format("%d-%m-%Y").to_string(),
        })
    }

    /// Number with all but the last four digits hidden
    pub fn masked_number(&self) -> String {
        mask(&self.number, 4)
    }
}

impl PanDetails {
    /// Validate and normalize: 10 alphanumeric characters, upper-cased
    pub fn normalized(self) -> Result<Self, FlowError> {
        let full_name = require_name(&self.full_name)?;

        let number = strip_separators(&self.number).to_ascii_uppercase();
        if number.len() != 10 || !number.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FlowError::InvalidField {
                field: "number",
                reason: "PAN number must be exactly 10 letters or digits".to_string(),
            });
        }

        let dob = self.dob.trim().to_string();
        if dob.is_empty() {
            return Err(FlowError::InvalidField {
                field: "dob",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            full_name,
            number,
            dob,
        })
    }

    pub fn masked_number(&self) -> String {
        mask(&self.number, 4)
    }
}

fn mask(value: &str, visible: usize) -> String {
    let len = value.chars().count();
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i + visible < len { '*' } else { c })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub created_at: DateTime<Utc>,
}

fn serialize_masked_aadhar<S: Serializer>(
    details: &Option<AadharDetails>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    details
        .as_ref()
        .map(|d| AadharDetails {
            number: d.masked_number(),
            ..d.clone()
        })
        .serialize(serializer)
}

fn serialize_masked_pan<S: Serializer>(
    details: &Option<PanDetails>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    details
        .as_ref()
        .map(|d| PanDetails {
            number: d.masked_number(),
            ..d.clone()
        })
        .serialize(serializer)
}

/// Everything the dashboard shows about the dialogue's progress
///
/// Document numbers are serialized masked, as in the logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub phase: Phase,
    #[serde(serialize_with = "serialize_masked_aadhar")]
    pub aadhar: Option<AadharDetails>,
    #[serde(serialize_with = "serialize_masked_pan")]
    pub pan: Option<PanDetails>,
    pub verification: Option<VerificationOutcome>,
    pub account: Option<AccountRecord>,
    pub updated_at: DateTime<Utc>,
}

impl Default for FlowSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Aadhar,
            aadhar: None,
            pan: None,
            verification: None,
            account: None,
            updated_at: Utc::now(),
        }
    }
}

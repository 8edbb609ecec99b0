use super::state::{parse_dob, AadharDetails, PanDetails, VerificationOutcome};

/// Decides whether the two collected documents belong to the same person
pub trait DocumentMatcher: Send + Sync {
    fn compare(&self, aadhar: &AadharDetails, pan: &PanDetails) -> VerificationOutcome;
}

/// Matches on full name (case and punctuation insensitive) and date of birth
#[derive(Debug, Default, Clone, Copy)]
pub struct NameAndDobMatcher;

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn same_dob(a: &str, b: &str) -> bool {
    match (parse_dob(a), parse_dob(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

impl DocumentMatcher for NameAndDobMatcher {
    fn compare(&self, aadhar: &AadharDetails, pan: &PanDetails) -> VerificationOutcome {
        if normalize_name(&aadhar.full_name) == normalize_name(&pan.full_name)
            && same_dob(&aadhar.dob, &pan.dob)
        {
            VerificationOutcome::Match
        } else {
            VerificationOutcome::Mismatch
        }
    }
}

/// Always returns the same outcome; useful for demos
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcomeMatcher(pub VerificationOutcome);

impl DocumentMatcher for FixedOutcomeMatcher {
    fn compare(&self, _aadhar: &AadharDetails, _pan: &PanDetails) -> VerificationOutcome {
        self.0
    }
}

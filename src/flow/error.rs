use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Both Aadhar and PAN details must be saved before verification")]
    MissingDocuments,

    #[error("Details have not been verified yet")]
    NotVerified,

    #[error("Account has already been created")]
    AlreadyComplete,
}

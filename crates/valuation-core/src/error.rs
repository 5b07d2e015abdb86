use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Missing required inputs: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Duplicate field key: {0}")]
    DuplicateField(String),
}

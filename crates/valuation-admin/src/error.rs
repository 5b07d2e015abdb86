use thiserror::Error;
use valuation_core::ValuationError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdminError {
    #[error("Incorrect admin password")]
    InvalidPassword,

    #[error("Admin mode is not configured")]
    Disabled,

    #[error("Admin login required")]
    NotAuthenticated,

    #[error("Export a backup of the current fields or formulas before editing")]
    BackupRequired,

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Invalid indicator: {0}")]
    InvalidIndicator(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Field(#[from] ValuationError),
}

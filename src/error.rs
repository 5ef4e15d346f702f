use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesCountError {
    #[error("Invalid grouping window {0}: must be between 0 and 366 days")]
    InvalidWindow(i64),

    #[error("Invalid document marker: {0}")]
    InvalidDocumentMarker(String),

    #[error("Invalid advisor configuration: {0}")]
    InvalidAdvisorConfig(String),

    #[error("Unknown advisor type label '{0}': expected INTERNAL, EXTERNAL or BROKERED")]
    InvalidAdvisorType(String),

    #[error("Breakdown '{breakdown}' does not add up: expected {expected_count} sales worth {expected_value}, got {actual_count} sales worth {actual_value}")]
    BreakdownMismatch {
        breakdown: String,
        expected_count: usize,
        expected_value: f64,
        actual_count: usize,
        actual_value: f64,
    },

    #[error("Date parse error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SalesCountError>;

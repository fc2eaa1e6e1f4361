use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid regularity: {0}")]
    InvalidRegularity(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationError(err.to_string())
    }
}

impl From<chrono::ParseError> for SyncError {
    fn from(err: chrono::ParseError) -> Self {
        SyncError::DateParse(err.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildLensError {
    #[error("Invalid job path '{value}': job must be in the format {expected}")]
    InvalidIdentifier {
        value: String,
        expected: &'static str,
    },

    #[error("Concourse API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unable to parse revision timestamp '{value}': {source}")]
    TimestampParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildLensError>;

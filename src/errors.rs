/// Domain-specific error types for the edge pipeline.
/// Per-quote and per-event failures are isolated by the caller:
/// - `InvalidPrice` skips one quote
/// - `InsufficientData` skips one market (no fair probability, never 50/50)
/// - everything else fails the current request or refresh only
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("ingest error: {0}")]
    Ingest(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

impl From<serde_json::Error> for EdgeError {
    fn from(e: serde_json::Error) -> Self {
        EdgeError::Parse(e.to_string())
    }
}

impl From<chrono::ParseError> for EdgeError {
    fn from(e: chrono::ParseError) -> Self {
        EdgeError::Parse(e.to_string())
    }
}

impl From<rusqlite::Error> for EdgeError {
    fn from(e: rusqlite::Error) -> Self {
        EdgeError::Database(e.to_string())
    }
}

impl From<std::io::Error> for EdgeError {
    fn from(e: std::io::Error) -> Self {
        EdgeError::Database(e.to_string())
    }
}

pub type EdgeResult<T> = Result<T, EdgeError>;

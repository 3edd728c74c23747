use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Index outside the current history bounds
    #[error("Index {index} out of range (history has {len} entries)")]
    OutOfRange { index: usize, len: usize },

    #[error("I/O Error: {0}")]
    Io(String),

    /// Persisted history exists but could not be understood
    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Clipboard Error: {0}")]
    Clipboard(String),

    #[error("Settings Error: {0}")]
    Settings(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(format!("Serialization error: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Io(format!("Background task failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

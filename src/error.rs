use thiserror::Error;

/// Launchpad uploader errors
#[derive(Debug, Error)]
pub enum UploaderError {
    /// HTTP transport errors (connection refused, timeout, broken body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status we treat as failure
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller input errors (empty id, unreadable selection, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<UploaderError> for String {
    fn from(err: UploaderError) -> String {
        err.to_string()
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, UploaderError>;
}

impl<T, E: Into<UploaderError>> ErrorContext<T> for Result<T, E> {
    fn context(self, msg: &str) -> Result<T, UploaderError> {
        self.map_err(|e| match e.into() {
            UploaderError::Config(s) => UploaderError::Config(format!("{}: {}", msg, s)),
            UploaderError::Validation(s) => UploaderError::Validation(format!("{}: {}", msg, s)),
            UploaderError::Other(s) => UploaderError::Other(format!("{}: {}", msg, s)),
            UploaderError::Io(e) => {
                UploaderError::Io(std::io::Error::new(e.kind(), format!("{}: {}", msg, e)))
            }
            other => other,
        })
    }
}

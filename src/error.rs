// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HerdError>;

#[derive(Error, Debug)]
pub enum HerdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scan failed: {0}")]
    Scan(#[from] walkdir::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to discard {file}: {source}")]
    Discard { file: String, source: git2::Error },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HerdError {
    /// True for errors caused by the shared cancellation signal rather than
    /// the repository itself.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, HerdError::Cancelled)
    }
}

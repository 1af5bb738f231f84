//! Error types for Cloudpad.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Index out of range: {0}")]
    IndexOutOfRange(usize),

    #[error("No app deployed at index {0}")]
    EmptySlot(usize),

    #[error("No inactive node in row {0}")]
    NoInactiveNode(usize),

    #[error("No active node in row {0}")]
    NoActiveNode(usize),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error came from talking to the remote backend.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::EmptySlot(7).to_string(), "No app deployed at index 7");
        assert_eq!(Error::IndexOutOfRange(9).to_string(), "Index out of range: 9");
    }

    #[test]
    fn test_is_remote() {
        assert!(Error::Http("connection refused".into()).is_remote());
        assert!(Error::Backend("409 conflict".into()).is_remote());
        assert!(!Error::EmptySlot(0).is_remote());
    }
}

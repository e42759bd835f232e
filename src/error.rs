//! Error types for the annotation engine

use thiserror::Error;

use crate::markup::NodePath;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Capture declined: {0}")]
    Capture(#[from] CaptureError),

    #[error("Comment store error: {0}")]
    Store(#[from] StoreError),

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether the user can simply try the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store(e) if e.is_retryable())
    }
}

/// Reasons a live selection does not become an anchor candidate.
///
/// These are recovered locally: the capture UI declines to open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("selection is empty or collapsed")]
    Empty,

    #[error("selection lies outside the document content")]
    OutsideContent,

    #[error("selection is {length} characters, minimum is {minimum}")]
    TooShort { length: usize, minimum: usize },

    #[error("selection boundary {0} cannot be located in the rendered content")]
    Unresolvable(NodePath),

    #[error("no selection has been captured")]
    NothingCaptured,
}

/// Errors reported by the comment or content store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Transient failures are surfaced to the user as retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Markup processing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),

    #[error("Markup parse failed at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Invalid node path: {0}")]
    InvalidPath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_retryable() {
        let err: AppError = StoreError::Unavailable("connection reset".to_string()).into();
        assert!(err.is_retryable());

        let err: AppError = StoreError::Rejected("body too long".to_string()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_capture_error_messages() {
        let err = CaptureError::TooShort {
            length: 2,
            minimum: 3,
        };
        assert_eq!(err.to_string(), "selection is 2 characters, minimum is 3");
    }
}

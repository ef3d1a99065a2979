// Domain errors - Error types for the domain layer

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// Camera or microphone access was refused
    PermissionDenied(String),
    /// Metadata never loaded or the source could not be decoded
    UnsupportedSource(String),
    /// Recorder unavailable or produced no output
    CaptureFailure(String),
    /// Command is not valid in the current session state
    InvalidState(String),
    /// Operation was cancelled before it finished
    Cancelled,
    /// Filesystem failure
    FsFail(String),
    /// Processing error
    ProcessingError(String),
    /// Internal error
    InternalError(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            DomainError::UnsupportedSource(msg) => write!(f, "Unsupported source: {}", msg),
            DomainError::CaptureFailure(msg) => write!(f, "Capture failed: {}", msg),
            DomainError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            DomainError::Cancelled => write!(f, "Operation cancelled"),
            DomainError::FsFail(msg) => write!(f, "Filesystem error: {}", msg),
            DomainError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            DomainError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

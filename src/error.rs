//! Global error handling for snapfs
//!
//! This module provides a centralized error type that can represent errors
//! from all modules in the project.

use std::io;
use thiserror::Error;

/// Global error type for snapfs operations
#[derive(Error, Debug)]
pub enum SnapError {
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot document errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Patch application errors
    #[error("Patch error: {0}")]
    Patch(String),

    /// Relative-path errors (non-UTF-8 names, components escaping the root)
    #[error("Path error: {0}")]
    Path(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Specialized Result type for snapfs operations
pub type Result<T> = std::result::Result<T, SnapError>;

/// Creates a SnapError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::SnapError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

// Allow converting SnapError to io::Error so io-typed helpers can bubble
// engine failures without a second error channel.
impl From<SnapError> for io::Error {
    fn from(err: SnapError) -> Self {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }
}

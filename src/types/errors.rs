//! Bridge error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Errors
//! raised by user callbacks are not represented here: they belong to the
//! script runtime and travel through `ScriptRuntime::Error` untouched.

use thiserror::Error;

/// Bridge result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the WiFi event bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// The network stack refused the event handler registration.
    /// Fatal for role construction.
    #[error("event registration failed: {0}")]
    Registration(String),

    /// A stack control operation (init, mode, config, start, stop, connect) failed.
    #[error("network stack error: {0}")]
    Stack(String),

    /// Configuration value rejected before it reached the stack.
    #[error("validation error: {0}")]
    Validation(String),

    /// A readiness wait ran past its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error aborts role construction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Registration(_))
    }
}

// Convenience constructors
impl Error {
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    pub fn stack(msg: impl Into<String>) -> Self {
        Self::Stack(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

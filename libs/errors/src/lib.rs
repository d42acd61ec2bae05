//! Unified error handling for the edgelink acquisition stack
//!
//! Every fallible operation in the codec, the formula evaluator and the
//! acquisition service reports one of the [`AcqError`] variants. The scheduler
//! catches them per measurement, so the taxonomy mostly decides how loudly a
//! failure is logged and whether a retry makes sense.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorInfo - remote command error reply
// ============================================================================

/// Error information returned to remote command callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    /// Status code (HTTP-like)
    pub code: u16,
    /// Error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            message: message.into(),
            details: None,
        }
    }

    /// Set the error code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// AcqError - Main error type
// ============================================================================

/// Main error type for the acquisition crates
#[derive(Debug, Error)]
pub enum AcqError {
    // ======================================
    // Codec Errors
    // ======================================
    #[error("Invalid value type: {0}")]
    InvalidType(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // ======================================
    // Field Bus Errors
    // ======================================
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Device not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Derived Value Errors
    // ======================================
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Query error: {0}")]
    Query(String),

    // ======================================
    // Configuration & Dispatch Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

/// Result type alias using AcqError
pub type AcqResult<T> = Result<T, AcqError>;

/// Coarse classification used for logging and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Codec,
    Transport,
    Evaluation,
    Configuration,
    Dispatch,
}

impl AcqError {
    pub fn invalid_type(msg: impl Into<String>) -> Self {
        Self::InvalidType(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidType(_) | Self::InvalidValue(_) => ErrorCategory::Codec,
            Self::Transport(_) | Self::NotConnected | Self::Io(_) => ErrorCategory::Transport,
            Self::Evaluation(_) | Self::Query(_) => ErrorCategory::Evaluation,
            Self::Configuration(_) | Self::Serialization(_) => ErrorCategory::Configuration,
            Self::Dispatch(_) => ErrorCategory::Dispatch,
        }
    }

    /// Status code reported to remote command callers
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Codec | ErrorCategory::Configuration => 400,
            ErrorCategory::Evaluation => 422,
            ErrorCategory::Transport | ErrorCategory::Dispatch => 502,
        }
    }

    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Dispatch
        )
    }

    /// Convert to ErrorInfo for remote command replies
    pub fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.to_string()).with_code(self.status_code());
        match self {
            Self::InvalidType(name) => info.with_details(format!("value type '{}'", name)),
            _ => info,
        }
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for AcqError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AcqError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for AcqError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}

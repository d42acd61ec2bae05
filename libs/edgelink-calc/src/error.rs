//! Error types for edgelink-calc

use errors::AcqError;
use thiserror::Error;

/// Formula errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Math error: {0}")]
    Math(String),
}

impl CalcError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownFunction(name.into())
    }

    pub fn math(msg: impl Into<String>) -> Self {
        Self::Math(msg.into())
    }
}

impl From<CalcError> for AcqError {
    fn from(err: CalcError) -> Self {
        AcqError::evaluation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;

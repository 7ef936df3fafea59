//! Error types for the ITR Engine.
//!
//! The computation core itself is total and never fails.  Errors only
//! arise at its edges: strict input normalisation, rule-set loading and
//! validation, and the HTTP layer.

use thiserror::Error;

/// Rejection raised by strict input normalisation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("field '{field}' is not a number: {value}")]
    NotNumeric { field: String, value: String },

    #[error("field '{field}' must not be negative: {value}")]
    Negative { field: String, value: f64 },

    #[error("field '{field}' is not a boolean: {value}")]
    NotBoolean { field: String, value: String },

    #[error("expected a JSON object of input fields")]
    NotAnObject,
}

/// A rule set that cannot be used for computation.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("{regime} regime: {message}")]
    Invalid { regime: &'static str, message: String },

    #[error("invalid rule set: {0}")]
    InvalidParameter(String),

    #[error("failed to read rule set: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rule set: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("no rule set registered for assessment year '{0}'")]
    UnknownAssessmentYear(String),

    #[error("unknown regime '{0}'")]
    UnknownRegime(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            ApiError::Input(_) => 400,
            ApiError::UnknownAssessmentYear(_) | ApiError::UnknownRegime(_) => 404,
        }
    }
}

//! Error types for flight plan editing and navigation data lookups.

use thiserror::Error;

/// Failures reported by a navigation database backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavDataError {
    #[error("navigation database unavailable: {0}")]
    Unavailable(String),

    #[error("malformed navigation data: {0}")]
    Malformed(String),
}

/// Errors raised by flight plan operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("{what} '{ident}' not found")]
    NotFound { what: &'static str, ident: String },

    #[error("index {index} is out of bounds (length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("element at index {index} is {found}, expected {expected}")]
    InvalidLegType {
        index: usize,
        found: String,
        expected: &'static str,
    },

    #[error("invalid direct-to target at index {index}: {reason}")]
    InvalidTarget { index: usize, reason: &'static str },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("flight plan invariant violated: {0}")]
    InvariantViolation(String),

    #[error("plan slot {slot} changed while a lookup was pending")]
    Superseded { slot: usize },

    #[error(transparent)]
    Database(#[from] NavDataError),
}

impl PlanError {
    pub fn not_found(what: &'static str, ident: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            ident: ident.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }
}

/// Result type for flight plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

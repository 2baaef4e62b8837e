//! Unified error type for the booking engine and its HTTP surface.
//!
//! Every core operation returns [`Result`]. Variants carry enough context to build a
//! user-facing message; [`Error::kind`] collapses them into the closed set of failure kinds
//! that the transport layer maps to status codes.

use thiserror::Error;

/// The closed set of failure kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or a violated business bound
    Validation,
    /// A referenced record does not exist
    NotFound,
    /// Capacity, overlap or uniqueness conflict
    Conflict,
    /// No actor on the request
    Unauthenticated,
    /// Actor lacks the required role
    Forbidden,
    /// Anything unexpected
    Internal,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Validation { message: String },

    #[error("Requested date exceeds the booking window of {days} days")]
    BookingWindowExceeded { days: i32 },

    #[error("Insufficient stock for {item} (available {available}, required {required})")]
    InsufficientStock {
        item: String,
        available: i64,
        required: i64,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Maps the variant onto its failure kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::BookingWindowExceeded { .. }
            | Self::InsufficientStock { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

//! Unified error types and result handling for `AttendanceBuddy`.

use thiserror::Error;

/// Every failure the crate can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or environment could not be used
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input was refused before anything was written
    #[error("Validation error: {message}")]
    Validation {
        /// Which rule was broken
        message: String,
    },

    /// No class with the given identifier exists
    #[error("Class not found: {id}")]
    ClassNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// No term with the given identifier exists
    #[error("Term not found: {id}")]
    TermNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// A class with the same code and year group already exists
    #[error("Class {code} ({year_group}) already exists")]
    DuplicateClass {
        /// Display code of the class
        code: String,
        /// Year-group label of the class
        year_group: String,
    },

    /// Error from the local database
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON serialization or parsing failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// The remote document store rejected or failed a write
    #[error("Remote sync error: {message}")]
    Remote {
        /// Description of the remote failure
        message: String,
    },
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

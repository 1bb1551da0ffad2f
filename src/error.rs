//! Error handling for the send engine.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for engine operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed `{U+...}` directive; the rest of the send is abandoned.
    #[error("Invalid unicode directive: {0}")]
    InvalidUnicode(String),
    /// A parameter was outside its accepted range or set.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Parameter name.
        name: &'static str,
        /// Offending value as given.
        value: String,
    },
    /// Admission was requested for an id that is not registered.
    #[error("Unknown trigger id: {0}")]
    UnknownTrigger(u32),
    /// A platform call failed.
    #[error("Platform error: {0}")]
    Platform(String),
    /// Configuration parsing errors.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn invalid_value(name: &'static str, value: impl ToString) -> Self {
        Error::InvalidValue {
            name,
            value: value.to_string(),
        }
    }
}

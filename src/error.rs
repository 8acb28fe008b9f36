//! Error types shared by the logging engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::token::TokenType;

/// Result type for nanolog operations.
pub type Result<T> = std::result::Result<T, NanoLogError>;

/// Errors surfaced by sinks, the file store and decoded-token accessors.
///
/// Decoding a token stream never produces one of these: a malformed stream
/// stops the visitor instead.
#[derive(Error, Debug)]
pub enum NanoLogError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong with it.
        message: String,
    },

    /// A level directive such as `app=debug` could not be parsed.
    #[error("invalid level directive: {directive}")]
    InvalidDirective {
        /// The offending directive.
        directive: String,
    },

    /// The file store has no open file, the record was dropped.
    #[error("log file unavailable: {path}")]
    FileUnavailable {
        /// Path the store tried to create.
        path: PathBuf,
    },

    /// The encoded message cannot be described by the on-disk length field.
    #[error("message of {len} bytes exceeds the record limit")]
    MessageTooLarge {
        /// Encoded message length.
        len: usize,
    },

    /// A decoded token was read as a kind it does not hold.
    #[error("type mismatch: expected {expected}, found {actual:?}")]
    TypeMismatch {
        /// Requested kind.
        expected: &'static str,
        /// Kind actually stored in the token.
        actual: TokenType,
    },

    /// A structured value has no member with this name.
    #[error("no member named `{0}`")]
    MissingMember(String),

    /// Member lookup on a scalar token.
    #[error("token is not a structured value")]
    NotStructured,
}

impl NanoLogError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &'static str, actual: TokenType) -> Self {
        Self::TypeMismatch { expected, actual }
    }
}

//! Rules-file error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::repeater::RepeaterError;

/// Errors that can occur while loading or applying a rules file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rules file does not exist.
    #[error("rules file not found: {0}")]
    NotFound(PathBuf),

    /// The rules file could not be read.
    #[error("failed to read rules file {path}: {source}")]
    ReadError {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The rules file is not valid JSON or has an unexpected shape.
    #[error("failed to parse rules: {0}")]
    ParseError(#[from] serde_json::Error),

    /// One or more of the four required sections is absent.
    #[error("missing required sections: {}", .0.join(", "))]
    MissingSections(Vec<&'static str>),

    /// An id field was zero or negative.
    #[error("{field} must be a positive id (got {value})")]
    NonPositiveId {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The value found.
        value: i64,
    },

    /// An address field was not a dotted quad (or `"*"` where allowed).
    #[error("{field} is not a valid IPv4 address: {value:?}")]
    InvalidAddress {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The value found.
        value: String,
    },

    /// A port field was not a number between 1024 and 65536 noninclusive
    /// (or `"*"` where allowed).
    #[error("{field} is not a valid port: {value:?} (must be between 1024 and 65536 noninclusive)")]
    InvalidPort {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The value found.
        value: String,
    },

    /// An entity-creation call rejected the parsed values.
    #[error(transparent)]
    Repeater(#[from] RepeaterError),
}

/// Result type alias for rules-file operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

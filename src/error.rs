//! Error types for `scamdrill`
//!
//! The session core never fails: invalid transitions are reported as "no
//! effect" and empty content windows resolve to fallbacks. The errors here
//! cover the files and streams around it and map onto process exit codes.
//! Score sink failures are logged by the controller and never reach the
//! process exit status.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `scamdrill` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// Configuration error (invalid YAML, catalog or rules validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `scamdrill` operations.
#[derive(Debug, Error)]
pub enum ScamDrillError {
    /// Catalog or rules loading/validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScamDrillError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Catalog and rules loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the file (or `<builtin>` for embedded catalogs)
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Catalog validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the catalog file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// File exceeds the configured size limit
    #[error("file too large: {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the oversized file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found while checking a catalog.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., `"scenarios[2].difficulty"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - the catalog cannot be used
    Error,
    /// Warning - the catalog is usable but probably not what was intended
    Warning,
}

// ============================================================================
// Score Sink Errors
// ============================================================================

/// Errors reported by a [`ScoreSink`](crate::session::ScoreSink).
///
/// The controller logs and counts these and the session has no result;
/// the game carries on.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached
    #[error("score sink unavailable: {0}")]
    Unavailable(String),

    /// The sink refused the record
    #[error("score rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Tests
// ============================================================================

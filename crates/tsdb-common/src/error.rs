//! Error types for the TimescaleDB log store.
//!
//! Each crate keeps its own `thiserror` enum for the errors it produces.
//! This module provides the unified [`Error`] those enums convert into at the
//! CLI boundary, with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Connection Failed
//!   Reason: could not connect to tsdb.internal:5433 after 3 attempts
//!   Fix: Check that the server is reachable and the credentials are correct.
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for log store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed settings.
    Config,
    /// Establishing or keeping the database connection.
    Connection,
    /// Statement execution against the store.
    Query,
    /// One-shot schema bootstrap.
    Install,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Connection => write!(f, "connection"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Install => write!(f, "install"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the log store.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required setting: {key}")]
    MissingSetting { key: String },

    #[error("invalid value for {field}: {message}")]
    InvalidSetting { field: String, message: String },

    // Connection errors (20-29)
    #[error("could not connect to {host}:{port} after {attempts} attempts: {message}")]
    Connection {
        host: String,
        port: u16,
        attempts: u32,
        message: String,
    },

    #[error("not connected to the database")]
    NotConnected,

    // Query errors (30-39)
    #[error("query failed: {0}")]
    Query(String),

    // Install errors (40-49)
    #[error("installation failed: {0}")]
    Install(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Connection errors
    /// - 30-39: Query errors
    /// - 40-49: Install errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::MissingSetting { .. } => 11,
            Error::InvalidSetting { .. } => 12,
            Error::Connection { .. } => 20,
            Error::NotConnected => 21,
            Error::Query(_) => 30,
            Error::Install(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::MissingSetting { .. } | Error::InvalidSetting { .. } => {
                ErrorCategory::Config
            }
            Error::Connection { .. } | Error::NotConnected => ErrorCategory::Connection,
            Error::Query(_) => ErrorCategory::Query,
            Error::Install(_) => ErrorCategory::Install,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether retrying later may succeed without changing settings.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::MissingSetting { .. } | Error::InvalidSetting { .. } => false,
            Error::Connection { .. } | Error::NotConnected => true,
            Error::Query(_) => true,
            Error::Install(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidSetting { .. } => {
                "Fix the value in logstore.toml or the matching TSDB_* environment variable."
            }
            Error::MissingSetting { .. } => {
                "Set host, port, database, username, password and dbtable before connecting."
            }
            Error::Connection { .. } => {
                "Check that the server is reachable and the credentials are correct."
            }
            Error::NotConnected => "Reconnect the client; the previous connection was lost.",
            Error::Query(_) => "Check the statement and that the table has been installed.",
            Error::Install(_) => {
                "Check that the user may create tables in the target schema, then re-run install."
            }
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Check the input is valid JSON (one event object per line).",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::MissingSetting { .. } => "Missing Setting",
            Error::InvalidSetting { .. } => "Invalid Setting",
            Error::Connection { .. } => "Connection Failed",
            Error::NotConnected => "Not Connected",
            Error::Query(_) => "Query Failed",
            Error::Install(_) => "Installation Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "Invalid JSON",
        }
    }

    /// Format for human consumption: headline, reason, fix.
    pub fn format_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}

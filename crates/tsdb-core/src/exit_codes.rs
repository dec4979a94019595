//! Exit codes for the `tsdb-logstore` CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Success/operational outcomes
//! - 10-19: Configuration errors (fix the settings)
//! - 20-29: Store errors (server unreachable, statements refused)
//! - 30-39: Local errors

use tsdb_common::ErrorCategory;

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Success / Operational Outcomes (0-1)
    // ========================================================================
    /// Success
    Clean = 0,

    /// Completed, but some rows or optional steps failed
    Partial = 1,

    // ========================================================================
    // Configuration Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Missing or invalid settings
    ConfigError = 11,

    // ========================================================================
    // Store Errors (20-29)
    // ========================================================================
    /// Could not connect to the server
    ConnectionError = 20,

    /// The server refused a statement
    QueryError = 21,

    /// Table bootstrap failed
    InstallError = 22,

    // ========================================================================
    // Local Errors (30-39)
    // ========================================================================
    /// File read or parse error
    IoError = 30,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-1.
    pub fn is_success(self) -> bool {
        (self as i32) < 10
    }

    /// Name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::Partial => "OK_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::ConnectionError => "ERR_CONNECTION",
            ExitCode::QueryError => "ERR_QUERY",
            ExitCode::InstallError => "ERR_INSTALL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for an error of `category`.
    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Connection => ExitCode::ConnectionError,
            ErrorCategory::Query => ExitCode::QueryError,
            ErrorCategory::Install => ExitCode::InstallError,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}

impl From<&tsdb_common::Error> for ExitCode {
    fn from(err: &tsdb_common::Error) -> Self {
        ExitCode::for_category(err.category())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories_map_to_codes() {
        let err = tsdb_common::Error::MissingSetting { key: "host".into() };
        assert_eq!(ExitCode::from(&err), ExitCode::ConfigError);
        let err = tsdb_common::Error::NotConnected;
        assert_eq!(ExitCode::from(&err), ExitCode::ConnectionError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::Partial.to_string(), "OK_PARTIAL (1)");
        assert!(ExitCode::Partial.is_success());
        assert!(!ExitCode::IoError.is_success());
    }
}

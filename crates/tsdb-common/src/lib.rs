//! TimescaleDB log store common types.
//!
//! This crate provides foundational pieces shared by the client, the
//! configuration layer, and the installer:
//! - Unified error type with stable codes and categories
//! - SQL identifier validation and quoting
//! - The fixed event table schema

pub mod error;
pub mod ident;
pub mod schema;

pub use error::{Error, ErrorCategory, Result};
pub use ident::{is_valid_identifier, qualified_name, quote_ident, quote_literal};
pub use schema::{ColumnDef, IndexDef, EVENT_COLUMNS, INSERT_COLUMNS, ORDERABLE_COLUMNS};

/// Default destination table name.
pub const DEFAULT_TABLE: &str = "moodle_events";

/// Default schema the installer creates the table in.
pub const DEFAULT_SCHEMA: &str = "public";

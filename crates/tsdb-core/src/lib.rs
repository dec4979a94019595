//! TimescaleDB log store core library.
//!
//! This library provides:
//! - Exit codes for the `tsdb-logstore` CLI
//! - CLI argument definitions
//! - The one-shot installer for the event table
//! - Log stores and the flush task that drains them
//! - JSON-lines ingest
//! - Logging setup
//!
//! The binary entry point is in `main.rs`.

pub mod cli;
pub mod exit_codes;
pub mod flush;
pub mod ingest;
pub mod install;
pub mod logging;
pub mod store;

pub use exit_codes::ExitCode;
pub use flush::{FlushSummary, FlushTask, StoreFailure, StoreRegistry};
pub use ingest::{ingest, read_event_lines, IngestError, IngestSummary};
pub use install::{
    CompressionStatus, IndexStatus, InstallError, InstallOptions, InstallReport, Installer,
    DEFAULT_COMPRESS_AFTER_HOURS,
};
pub use store::{LogStore, StoreError, TsdbStore, TSDB_STORE_NAME};

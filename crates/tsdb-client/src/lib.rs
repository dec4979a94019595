//! TimescaleDB event log client.
//!
//! This crate provides:
//! - Connection management with bounded, injectable retry
//! - ORDER BY allow-listing and LIMIT/OFFSET coercion
//! - Transactional batch writes that survive individual bad rows
//! - Degrading read helpers (count, listing, statistics, versions)
//!
//! All database access goes through the [`Connector`]/[`Connection`] traits;
//! [`PgConnector`] is the production implementation.

pub mod client;
pub mod connection;
pub mod error;
pub mod manager;
pub mod query;
pub mod record;
pub mod sanitize;
pub mod value;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{TimescaleClient, APPLICATION_NAME};
pub use connection::{Connection, Connector, DbError, DbErrorKind, PgConnector};
pub use error::{ClientError, ClientResult};
pub use manager::{ConnectionManager, RetryPolicy, Sleeper, ThreadSleeper};
pub use query::{EventQuery, DEFAULT_LIMIT};
pub use record::{format_other, EventRecord, RecordError};
pub use sanitize::{coerce_limit, coerce_offset, validate_order_by, Direction, OrderSpec};
pub use value::{Row, SqlValue};
pub use writer::BatchOutcome;

//! Client error types.

use thiserror::Error;
use tsdb_config::ValidationError;

use crate::connection::DbError;

/// Errors returned by the client's fallible operations.
///
/// The write and read helpers degrade to `false`, zero, empty or `None`
/// instead; these are what the underlying primitives report.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error("could not connect to {host}:{port} after {attempts} attempts: {last_error}")]
    Connection {
        host: String,
        port: u16,
        attempts: u32,
        last_error: String,
    },

    #[error("not connected to TimescaleDB")]
    NotConnected,

    #[error("query failed: {0}")]
    Query(#[from] DbError),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for tsdb_common::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Config(e) => e.into(),
            ClientError::Connection {
                host,
                port,
                attempts,
                last_error,
            } => tsdb_common::Error::Connection {
                host,
                port,
                attempts,
                message: last_error,
            },
            ClientError::NotConnected => tsdb_common::Error::NotConnected,
            ClientError::Query(e) => tsdb_common::Error::Query(e.message),
        }
    }
}

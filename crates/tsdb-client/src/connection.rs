//! Database connection seam.
//!
//! [`Connector`] opens a [`Connection`]; the production pair talks to
//! PostgreSQL through the synchronous `postgres` driver. Everything above
//! this module only sees the traits, so the batch writer and the query
//! facade run unchanged against the scripted connection in
//! [`crate::testing`].

use postgres::types::ToSql;
use postgres::{Client, NoTls};
use thiserror::Error;
use tsdb_config::ConnectionConfig;

use crate::value::{decode_row, Row, SqlValue};

/// Whether a failure is confined to one statement or took the session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The server rejected the statement; the session is still usable.
    Statement,
    /// The connection failed or was lost.
    Connection,
}

/// Error reported by a [`Connection`] or [`Connector`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl DbError {
    pub fn statement(message: impl Into<String>) -> Self {
        DbError {
            kind: DbErrorKind::Statement,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        DbError {
            kind: DbErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn is_connection(&self) -> bool {
        self.kind == DbErrorKind::Connection
    }
}

impl From<postgres::Error> for DbError {
    fn from(err: postgres::Error) -> Self {
        if let Some(db) = err.as_db_error() {
            return DbError::statement(format!("{}: {}", db.code().code(), db.message()));
        }
        let io_failure = std::error::Error::source(&err)
            .map(|source| source.is::<std::io::Error>())
            .unwrap_or(false);
        if err.is_closed() || io_failure {
            DbError::connection(err.to_string())
        } else {
            // Parameter encoding and row decoding errors happen client side.
            DbError::statement(err.to_string())
        }
    }
}

/// An open session.
pub trait Connection: Send {
    /// Run one parameterized statement, returning affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    /// Run one parameterized query.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError>;

    /// Run one or more unparameterized statements (transaction control, DDL).
    fn batch_execute(&mut self, sql: &str) -> Result<(), DbError>;
}

/// Opens sessions for a [`ConnectionConfig`].
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, DbError>;
}

/// Connector for a real PostgreSQL/TimescaleDB server.
#[derive(Debug, Clone, Default)]
pub struct PgConnector {
    application_name: Option<String>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` as `application_name` to the server.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }
}

impl Connector for PgConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, DbError> {
        let mut pg = postgres::Config::new();
        pg.host(config.host())
            .port(config.port())
            .dbname(config.database())
            .user(config.username())
            .password(config.password())
            .connect_timeout(config.connect_timeout());
        if let Some(name) = &self.application_name {
            pg.application_name(name);
        }

        // Every failure to establish a session is a connection failure,
        // including authentication errors reported by the server.
        let client = pg
            .connect(NoTls)
            .map_err(|e| DbError::connection(e.to_string()))?;
        Ok(Box::new(PgConnection { client }))
    }
}

/// Session backed by `postgres::Client`.
pub struct PgConnection {
    client: Client,
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Connection for PgConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        Ok(self.client.execute(sql, &param_refs(params))?)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let rows = self.client.query(sql, &param_refs(params))?;
        Ok(rows.iter().map(decode_row).collect())
    }

    fn batch_execute(&mut self, sql: &str) -> Result<(), DbError> {
        Ok(self.client.batch_execute(sql)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_kinds() {
        assert!(DbError::connection("reset").is_connection());
        assert!(!DbError::statement("syntax").is_connection());
        assert_eq!(DbError::statement("boom").to_string(), "boom");
    }

    #[test]
    fn test_pg_connector_unreachable_is_connection_error() {
        let config = ConnectionConfig::new("127.0.0.1", 1, "db", "user", "pw", "events")
            .unwrap()
            .with_connect_timeout(std::time::Duration::from_secs(1));
        let err = PgConnector::new().connect(&config).err().unwrap();
        assert!(err.is_connection());
    }
}

//! The TimescaleDB event log client.

use std::collections::HashMap;
use std::sync::Arc;

use tsdb_common::{quote_ident, schema::insert_sql};
use tsdb_config::ConnectionConfig;

use crate::connection::{Connector, PgConnector};
use crate::error::ClientResult;
use crate::manager::{ConnectionManager, RetryPolicy, Sleeper};

/// Name reported to the server as `application_name`.
pub const APPLICATION_NAME: &str = "tsdb-logstore";

/// Client for one event table.
///
/// Owns exactly one connection and runs every operation on it in turn;
/// nothing here is shared between threads. Writes live in
/// [`crate::writer`], reads in [`crate::query`].
#[derive(Debug)]
pub struct TimescaleClient {
    pub(crate) manager: ConnectionManager,
    pub(crate) table: String,
    pub(crate) insert_sql: String,
}

impl TimescaleClient {
    /// Build a client and connect to the server, retrying per
    /// [`RetryPolicy::default`].
    pub fn open(config: ConnectionConfig) -> ClientResult<Self> {
        let connector = PgConnector::new().with_application_name(APPLICATION_NAME);
        let mut client = Self::with_connector(config, Arc::new(connector));
        client.connect()?;
        Ok(client)
    }

    /// [`open`](Self::open) from a host configuration map.
    pub fn from_map(map: &HashMap<String, String>) -> ClientResult<Self> {
        Self::open(ConnectionConfig::from_map(map)?)
    }

    /// Build an unconnected client that opens sessions through `connector`.
    pub fn with_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let table = quote_ident(config.table());
        let insert_sql = insert_sql(&table);
        TimescaleClient {
            manager: ConnectionManager::new(config, connector),
            table,
            insert_sql,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.manager = self.manager.with_retry_policy(policy);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.manager = self.manager.with_sleeper(sleeper);
        self
    }

    /// (Re)connect, retrying per the configured policy.
    pub fn connect(&mut self) -> ClientResult<()> {
        self.manager.connect()
    }

    /// Probe the server; false when no session is open or it stopped answering.
    pub fn is_connected(&mut self) -> bool {
        self.manager.is_connected()
    }

    /// Close the session. Later calls do nothing.
    pub fn close(&mut self) {
        self.manager.close();
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.manager.config()
    }

    /// Destination table, quoted for SQL.
    pub fn table(&self) -> &str {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConnector;

    #[test]
    fn test_table_is_quoted_in_insert() {
        let config =
            ConnectionConfig::new("h", 5433, "db", "u", "p", "moodle_events").unwrap();
        let client = TimescaleClient::with_connector(config, Arc::new(ScriptedConnector::new()));
        assert_eq!(client.table(), "\"moodle_events\"");
        assert!(client.insert_sql.starts_with("INSERT INTO \"moodle_events\" (time, eventname"));
        assert!(client.insert_sql.ends_with("$20)"));
    }

    #[test]
    fn test_from_map_missing_key_is_config_error() {
        let map: HashMap<String, String> = [("host", "h"), ("port", "5433")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let err = TimescaleClient::from_map(&map).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: Missing required field: database");
    }
}

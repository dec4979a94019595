//! Typed store settings and the validated connection configuration.
//!
//! [`StoreSettings`] mirrors what an operator can configure (file or
//! environment) and may be incomplete. [`ConnectionConfig`] is the immutable
//! value a client connects with; it only exists once every identity field
//! has been checked.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// Required settings, in the order they are checked.
pub const REQUIRED_KEYS: [&str; 6] = ["host", "port", "database", "username", "password", "dbtable"];

/// How the host buffers events before they reach the client.
///
/// Carried so settings files round-trip; the client itself never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Sync,
    #[default]
    Async,
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(WriteMode::Sync),
            "async" => Ok(WriteMode::Async),
            _ => Err(format!("unknown write mode: {}", s)),
        }
    }
}

/// Store settings as loaded from `logstore.toml` and the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub dbtable: Option<String>,

    /// Connect timeout per attempt, in seconds.
    pub connect_timeout_secs: u64,

    // Host buffering policy; ignored at the client layer.
    pub writemode: WriteMode,
    pub buffersize: usize,
    pub flushinterval: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            host: None,
            port: Some(5433),
            database: Some("moodle_logs_tsdb".to_string()),
            username: Some("moodleuser".to_string()),
            password: None,
            dbtable: Some(tsdb_common::DEFAULT_TABLE.to_string()),
            connect_timeout_secs: crate::DEFAULT_CONNECT_TIMEOUT_SECS,
            writemode: WriteMode::Async,
            buffersize: 1000,
            flushinterval: 60,
        }
    }
}

/// Environment variables that override file settings.
pub(crate) const ENV_OVERRIDES: [(&str, &str); 6] = [
    ("host", "TSDB_HOST"),
    ("port", "TSDB_PORT"),
    ("database", "TSDB_DATABASE"),
    ("username", "TSDB_USERNAME"),
    ("password", "TSDB_PASSWORD"),
    ("dbtable", "TSDB_TABLE"),
];

impl StoreSettings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> ValidationResult<Self> {
        toml::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Apply `TSDB_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ValidationResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, var) in ENV_OVERRIDES {
            let Some(value) = lookup(var) else {
                continue;
            };
            match key {
                "host" => self.host = Some(value),
                "port" => self.port = Some(parse_port(&value)?),
                "database" => self.database = Some(value),
                "username" => self.username = Some(value),
                "password" => self.password = Some(value),
                "dbtable" => self.dbtable = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the identity fields and build the connection config.
    pub fn connection_config(&self) -> ValidationResult<ConnectionConfig> {
        let host = required("host", self.host.as_deref())?;
        let port = self
            .port
            .ok_or_else(|| ValidationError::MissingField("port".to_string()))?;
        let database = required("database", self.database.as_deref())?;
        let username = required("username", self.username.as_deref())?;
        let password = required("password", self.password.as_deref())?;
        let table = required("dbtable", self.dbtable.as_deref())?;

        ConnectionConfig::new(host, port, database, username, password, table)
            .map(|c| c.with_connect_timeout(Duration::from_secs(self.connect_timeout_secs)))
    }

    /// Settings for display, password masked, unset values marked.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        fn show(v: Option<&str>) -> String {
            match v {
                Some(s) if !s.trim().is_empty() => s.to_string(),
                _ => "not configured".to_string(),
            }
        }
        vec![
            ("host", show(self.host.as_deref())),
            ("port", show(self.port.map(|p| p.to_string()).as_deref())),
            ("database", show(self.database.as_deref())),
            ("username", show(self.username.as_deref())),
            (
                "password",
                match self.password.as_deref() {
                    Some(p) if !p.is_empty() => "********".to_string(),
                    _ => "not configured".to_string(),
                },
            ),
            ("dbtable", show(self.dbtable.as_deref())),
            ("writemode", format!("{:?}", self.writemode).to_lowercase()),
            ("buffersize", self.buffersize.to_string()),
            ("flushinterval", self.flushinterval.to_string()),
        ]
    }
}

fn required<'a>(key: &str, value: Option<&'a str>) -> ValidationResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(key.to_string())),
    }
}

fn parse_port(raw: &str) -> ValidationResult<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(ValidationError::invalid("port", "must be between 1 and 65535")),
        Ok(port) => Ok(port),
        Err(_) => Err(ValidationError::invalid(
            "port",
            format!("not a port number: {:?}", raw),
        )),
    }
}

/// Validated, immutable connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
    table: String,
    connect_timeout: Duration,
}

impl ConnectionConfig {
    /// Build a config, rejecting empty fields, a zero port and table names
    /// that are not plain identifiers.
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        table: &str,
    ) -> ValidationResult<Self> {
        let host = required("host", Some(host))?.trim();
        if port == 0 {
            return Err(ValidationError::invalid("port", "must be between 1 and 65535"));
        }
        let database = required("database", Some(database))?.trim();
        let username = required("username", Some(username))?.trim();
        let password = required("password", Some(password))?;
        let table = required("dbtable", Some(table))?.trim();
        if !tsdb_common::is_valid_identifier(table) {
            return Err(ValidationError::invalid(
                "dbtable",
                format!(
                    "{:?} is not a plain identifier (letters, digits, underscore)",
                    table
                ),
            ));
        }

        Ok(ConnectionConfig {
            host: host.to_string(),
            port,
            database: database.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            table: table.to_string(),
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    /// Build from a loosely-typed host configuration map.
    ///
    /// Fails with [`ValidationError::MissingField`] naming the first of
    /// [`REQUIRED_KEYS`] that is absent or empty. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> ValidationResult<Self> {
        for key in REQUIRED_KEYS {
            required(key, map.get(key).map(String::as_str))?;
        }
        let port = parse_port(&map["port"])?;
        let config = Self::new(
            &map["host"],
            port,
            &map["database"],
            &map["username"],
            &map["password"],
            &map["dbtable"],
        )?;

        match map.get("connect_timeout") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    ValidationError::invalid("connect_timeout", format!("not a number: {:?}", raw))
                })?;
                Ok(config.with_connect_timeout(Duration::from_secs(secs)))
            }
            None => Ok(config),
        }
    }

    /// Override the per-attempt connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Destination table name (validated identifier, unquoted).
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// `host:port`, for log lines and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"********")
            .field("table", &self.table)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

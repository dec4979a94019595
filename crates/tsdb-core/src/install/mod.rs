//! One-shot bootstrap of the event table.
//!
//! Steps, in order:
//! 1. Validate connection settings
//! 2. Connect once (no retry)
//! 3. Ensure the schema and point `search_path` at it
//! 4. Ensure the table (fatal on failure)
//! 5. Convert to a hypertable when `timescaledb` is installed, then confirm
//! 6. Ensure the time and user indexes
//! 7. Enable compression on confirmed hypertables and register the policy
//!
//! Steps 3 and 5-7 log and continue on failure. Every statement is
//! idempotent, so re-running an install changes nothing. Table names reach
//! the TimescaleDB functions as quoted `regclass` literals so mixed-case
//! names resolve to the table that was created.

mod report;

pub use report::{CompressionStatus, IndexStatus, InstallReport};

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use tsdb_client::{Connection, Connector, DbError, PgConnector, Row, APPLICATION_NAME};
use tsdb_common::schema::{create_table_sql, index_definitions, CHUNK_INTERVAL};
use tsdb_common::{is_valid_identifier, qualified_name, quote_ident, quote_literal, DEFAULT_SCHEMA};
use tsdb_config::{ConnectionConfig, StoreSettings, ValidationError};

/// Default compression policy threshold: 7 days.
pub const DEFAULT_COMPRESS_AFTER_HOURS: u64 = 7 * 24;

/// Installation failures. Anything not listed here is reported as a
/// warning in the [`InstallReport`] instead.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("installation postponed, incomplete settings: {0}")]
    Config(#[from] ValidationError),

    #[error("could not connect to {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    #[error("could not create table {table}: {message}")]
    CreateTable { table: String, message: String },
}

impl From<InstallError> for tsdb_common::Error {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::Config(e) => e.into(),
            InstallError::Connect {
                host,
                port,
                message,
            } => tsdb_common::Error::Connection {
                host,
                port,
                attempts: 1,
                message,
            },
            e @ InstallError::CreateTable { .. } => tsdb_common::Error::Install(e.to_string()),
        }
    }
}

/// Installation choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    schema: String,
    compress_after_hours: Option<u64>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        InstallOptions {
            schema: DEFAULT_SCHEMA.to_string(),
            compress_after_hours: Some(DEFAULT_COMPRESS_AFTER_HOURS),
        }
    }
}

impl InstallOptions {
    /// Install into `schema` instead of `public`.
    pub fn with_schema(mut self, schema: &str) -> Result<Self, ValidationError> {
        let schema = schema.trim();
        if !is_valid_identifier(schema) {
            return Err(ValidationError::InvalidValue {
                field: "schema".to_string(),
                message: format!("{:?} is not a plain identifier", schema),
            });
        }
        self.schema = schema.to_string();
        Ok(self)
    }

    /// Compression policy threshold; `None` enables compression without a
    /// policy.
    pub fn with_compress_after_hours(mut self, hours: Option<u64>) -> Self {
        self.compress_after_hours = hours.filter(|h| *h > 0);
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn compress_after_hours(&self) -> Option<u64> {
        self.compress_after_hours
    }
}

/// Runs installations through a [`Connector`].
pub struct Installer {
    connector: Arc<dyn Connector>,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new()
    }
}

impl Installer {
    /// Installer for a real server.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(
            PgConnector::new().with_application_name(APPLICATION_NAME),
        ))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Installer { connector }
    }

    /// Validate `settings` and install.
    pub fn install(
        &self,
        settings: &StoreSettings,
        options: &InstallOptions,
    ) -> Result<InstallReport, InstallError> {
        let config = settings.connection_config().map_err(|e| {
            error!(error = %e, "incomplete settings, installation postponed");
            InstallError::Config(e)
        })?;
        self.install_with_config(&config, options)
    }

    /// Install using an already validated config.
    pub fn install_with_config(
        &self,
        config: &ConnectionConfig,
        options: &InstallOptions,
    ) -> Result<InstallReport, InstallError> {
        let mut conn = self.connector.connect(config).map_err(|e| {
            error!(endpoint = %config.endpoint(), error = %e, "could not connect for installation");
            InstallError::Connect {
                host: config.host().to_string(),
                port: config.port(),
                message: e.message,
            }
        })?;
        info!(endpoint = %config.endpoint(), "connected for installation");

        let result = run_steps(conn.as_mut(), config.table(), options);
        drop(conn);

        match &result {
            Ok(report) => info!(
                table = %report.table,
                hypertable = report.hypertable,
                compression = report.compression_enabled(),
                warnings = report.warnings.len(),
                "installation finished"
            ),
            Err(e) => error!(error = %e, "installation aborted"),
        }
        result
    }
}

fn step(
    conn: &mut dyn Connection,
    report: &mut InstallReport,
    sql: &str,
    what: &str,
) -> Result<(), DbError> {
    match conn.batch_execute(sql) {
        Ok(()) => {
            info!(step = what, "ok");
            Ok(())
        }
        Err(e) => {
            warn!(step = what, error = %e, "step failed");
            report.warnings.push(format!("{}: {}", what, e));
            Err(e)
        }
    }
}

fn first_int(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.values().next())
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

fn run_steps(
    conn: &mut dyn Connection,
    table: &str,
    options: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let schema = options.schema();
    let qualified = qualified_name(schema, table);
    let plain = format!("{}.{}", schema, table);
    let mut report = InstallReport::new(plain.clone());

    let schema_ident = quote_ident(schema);
    let _ = step(
        conn,
        &mut report,
        &format!("CREATE SCHEMA IF NOT EXISTS {}", schema_ident),
        "create schema",
    );
    let _ = step(
        conn,
        &mut report,
        &format!("SET search_path TO {}", schema_ident),
        "set search_path",
    );

    if let Err(e) = conn.batch_execute(&create_table_sql(&qualified)) {
        error!(table = %plain, error = %e, "could not create event table");
        return Err(InstallError::CreateTable {
            table: plain,
            message: e.message,
        });
    }
    info!(table = %plain, "event table ready");

    report.timescaledb_available = match conn.query(
        "SELECT COUNT(*)::int AS cnt FROM pg_extension WHERE extname = 'timescaledb'",
        &[],
    ) {
        Ok(rows) => first_int(&rows) > 0,
        Err(e) => {
            warn!(error = %e, "could not check for the timescaledb extension");
            report
                .warnings
                .push(format!("extension check: {}", e));
            false
        }
    };

    let mut compression_on = false;
    if report.timescaledb_available {
        let _ = step(
            conn,
            &mut report,
            &format!(
                "SELECT create_hypertable({}, 'time', chunk_time_interval => INTERVAL '{}', \
                 if_not_exists => TRUE, migrate_data => TRUE)",
                quote_literal(&qualified),
                CHUNK_INTERVAL
            ),
            "create hypertable",
        );

        let confirm = format!(
            "SELECT compression_enabled FROM timescaledb_information.hypertables \
             WHERE hypertable_schema = {} AND hypertable_name = {}",
            quote_literal(schema),
            quote_literal(table)
        );
        let hypertable_row = conn
            .query(&confirm, &[])
            .ok()
            .and_then(|rows| rows.into_iter().next());
        report.hypertable = hypertable_row.is_some();
        compression_on = hypertable_row
            .as_ref()
            .and_then(|row| row.get("compression_enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if report.hypertable {
            info!(table = %plain, "hypertable confirmed");
        } else {
            warn!(table = %plain, "table is not a hypertable");
        }
    } else {
        info!("timescaledb extension not found, keeping a plain table");
    }

    for index in index_definitions(table) {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&index.name),
            qualified,
            index.keys
        );
        let outcome = step(conn, &mut report, &sql, &format!("index {}", index.name));
        report.indexes.push(IndexStatus {
            name: index.name,
            ok: outcome.is_ok(),
            error: outcome.err().map(|e| e.message),
        });
    }

    report.compression = if report.hypertable {
        enable_compression(conn, &mut report, &qualified, compression_on, options)
    } else {
        if report.timescaledb_available {
            info!("compression not applied, table is not a hypertable");
        }
        CompressionStatus::Skipped
    };

    Ok(report)
}

fn enable_compression(
    conn: &mut dyn Connection,
    report: &mut InstallReport,
    qualified: &str,
    already_enabled: bool,
    options: &InstallOptions,
) -> CompressionStatus {
    // The server refuses this ALTER once chunks are compressed.
    if already_enabled {
        info!(table = %qualified, "compression already enabled");
    } else if let Err(e) = step(
        conn,
        report,
        &format!("ALTER TABLE {} SET (timescaledb.compress)", qualified),
        "enable compression",
    ) {
        return CompressionStatus::Failed { error: e.message };
    }

    let Some(hours) = options.compress_after_hours() else {
        return CompressionStatus::Enabled {
            policy_after_hours: None,
        };
    };
    let policy = format!(
        "SELECT add_compression_policy({}, INTERVAL '{} hours', if_not_exists => TRUE)",
        quote_literal(qualified),
        hours
    );
    match step(conn, report, &policy, "compression policy") {
        Ok(()) => CompressionStatus::Enabled {
            policy_after_hours: Some(hours),
        },
        Err(_) => CompressionStatus::Enabled {
            policy_after_hours: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tsdb_client::testing::{row, ScriptedConnector};

    fn settings() -> StoreSettings {
        StoreSettings {
            host: Some("tsdb.test".into()),
            password: Some("pw".into()),
            ..Default::default()
        }
    }

    fn timescale() -> ScriptedConnector {
        ScriptedConnector::new()
            .respond("FROM pg_extension", vec![row([("cnt", json!(1))])])
            .respond(
                "timescaledb_information.hypertables",
                vec![row([("compression_enabled", json!(false))])],
            )
    }

    #[test]
    fn test_full_install_on_timescaledb() {
        let db = timescale();
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap();

        assert_eq!(report.table, "public.moodle_events");
        assert!(report.timescaledb_available);
        assert!(report.hypertable);
        assert_eq!(report.indexes.len(), 2);
        assert!(report.indexes.iter().all(|i| i.ok));
        assert_eq!(
            report.compression,
            CompressionStatus::Enabled {
                policy_after_hours: Some(168)
            }
        );
        assert!(report.is_complete());

        let statements = db.statements();
        let expected_prefixes = [
            "CREATE SCHEMA IF NOT EXISTS \"public\"",
            "SET search_path TO \"public\"",
            "CREATE TABLE IF NOT EXISTS \"public\".\"moodle_events\"",
            "SELECT COUNT(*)::int AS cnt FROM pg_extension",
            "SELECT create_hypertable('\"public\".\"moodle_events\"', 'time', chunk_time_interval => INTERVAL '1 day'",
            "SELECT compression_enabled FROM timescaledb_information.hypertables",
            "CREATE INDEX IF NOT EXISTS \"idx_moodle_events_time\" ON \"public\".\"moodle_events\" (time DESC)",
            "CREATE INDEX IF NOT EXISTS \"idx_moodle_events_userid\" ON \"public\".\"moodle_events\" (time DESC, userid)",
            "ALTER TABLE \"public\".\"moodle_events\" SET (timescaledb.compress)",
            "SELECT add_compression_policy('\"public\".\"moodle_events\"', INTERVAL '168 hours'",
        ];
        assert_eq!(statements.len(), expected_prefixes.len());
        for (statement, prefix) in statements.iter().zip(expected_prefixes) {
            assert!(statement.starts_with(prefix), "{statement:?} !~ {prefix:?}");
        }
    }

    #[test]
    fn test_plain_postgres_skips_hypertable_and_compression() {
        let db = ScriptedConnector::new()
            .respond("FROM pg_extension", vec![row([("cnt", json!(0))])]);
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap();

        assert!(!report.timescaledb_available);
        assert!(!report.hypertable);
        assert_eq!(report.compression, CompressionStatus::Skipped);
        assert_eq!(report.indexes.len(), 2);
        let statements = db.statements();
        assert!(!statements.iter().any(|s| s.contains("create_hypertable")));
        assert!(!statements.iter().any(|s| s.contains("timescaledb.compress")));
    }

    #[test]
    fn test_unconfirmed_hypertable_skips_compression() {
        let db = ScriptedConnector::new()
            .respond("FROM pg_extension", vec![row([("cnt", json!(1))])])
            .fail_statements_containing("create_hypertable");
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap();

        assert!(report.timescaledb_available);
        assert!(!report.hypertable);
        assert_eq!(report.compression, CompressionStatus::Skipped);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_table_failure_is_fatal() {
        let db = ScriptedConnector::new().fail_statements_containing("CREATE TABLE");
        let err = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::CreateTable { .. }));
        assert!(!db.statements().iter().any(|s| s.contains("CREATE INDEX")));
    }

    #[test]
    fn test_index_failure_is_not_fatal() {
        let db = timescale().fail_statements_containing("idx_moodle_events_userid");
        let report = Installer::with_connector(Arc::new(db))
            .install(&settings(), &InstallOptions::default())
            .unwrap();
        assert!(report.indexes[0].ok);
        assert!(!report.indexes[1].ok);
        assert!(report.compression_enabled());
        assert!(!report.is_complete());
    }

    #[test]
    fn test_missing_settings_never_connect() {
        let db = ScriptedConnector::new();
        let settings = StoreSettings {
            host: Some("tsdb.test".into()),
            ..Default::default()
        };
        let err = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings, &InstallOptions::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::Config(ValidationError::MissingField(ref k)) if k == "password"));
        assert_eq!(db.connect_attempts(), 0);
    }

    #[test]
    fn test_connect_failure_is_single_attempt() {
        let db = ScriptedConnector::new().refuse_connections(u32::MAX);
        let err = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::Connect { port: 5433, .. }));
        assert_eq!(db.connect_attempts(), 1);
    }

    #[test]
    fn test_custom_schema_and_no_policy() {
        let db = timescale();
        let options = InstallOptions::default()
            .with_schema("logs")
            .unwrap()
            .with_compress_after_hours(None);
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &options)
            .unwrap();
        assert_eq!(report.table, "logs.moodle_events");
        assert_eq!(
            report.compression,
            CompressionStatus::Enabled {
                policy_after_hours: None
            }
        );
        assert!(!db.statements().iter().any(|s| s.contains("add_compression_policy")));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        assert!(InstallOptions::default().with_schema("logs; DROP").is_err());
    }

    #[test]
    fn test_mixed_case_table_keeps_its_case() {
        let db = timescale();
        let settings = StoreSettings {
            dbtable: Some("MyEvents".into()),
            ..settings()
        };
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings, &InstallOptions::default())
            .unwrap();
        assert!(report.hypertable);
        assert!(report.is_complete());

        let statements = db.statements();
        let find = |fragment: &str| {
            statements
                .iter()
                .find(|s| s.contains(fragment))
                .cloned()
                .unwrap_or_default()
        };
        assert!(find("CREATE TABLE").contains(r#""public"."MyEvents""#));
        assert!(find("create_hypertable")
            .starts_with(r#"SELECT create_hypertable('"public"."MyEvents"'"#));
        assert!(find("add_compression_policy")
            .starts_with(r#"SELECT add_compression_policy('"public"."MyEvents"'"#));
        assert!(find("timescaledb_information.hypertables")
            .contains("hypertable_name = 'MyEvents'"));
    }

    #[test]
    fn test_reinstall_is_a_noop() {
        let db = timescale();
        let installer = Installer::with_connector(Arc::new(db.clone()));
        let config = settings().connection_config().unwrap();

        let first = installer
            .install_with_config(&config, &InstallOptions::default())
            .unwrap();
        let first_statements = db.statements();
        db.clear_statements();
        let second = installer
            .install_with_config(&config, &InstallOptions::default())
            .unwrap();

        assert_eq!(first, second);
        assert!(second.is_complete());
        assert_eq!(db.statements(), first_statements);
        for statement in &first_statements {
            let creates = statement.starts_with("CREATE")
                || statement.contains("create_hypertable")
                || statement.contains("add_compression_policy");
            if creates {
                assert!(
                    statement.contains("IF NOT EXISTS") || statement.contains("if_not_exists => TRUE"),
                    "{statement}"
                );
            }
        }
    }

    #[test]
    fn test_compression_already_enabled_skips_alter() {
        let db = ScriptedConnector::new()
            .respond("FROM pg_extension", vec![row([("cnt", json!(1))])])
            .respond(
                "timescaledb_information.hypertables",
                vec![row([("compression_enabled", json!(true))])],
            )
            .fail_statements_containing("SET (timescaledb.compress)");
        let report = Installer::with_connector(Arc::new(db.clone()))
            .install(&settings(), &InstallOptions::default())
            .unwrap();

        assert_eq!(
            report.compression,
            CompressionStatus::Enabled {
                policy_after_hours: Some(168)
            }
        );
        assert!(report.is_complete());
        let statements = db.statements();
        assert!(!statements.iter().any(|s| s.contains("SET (timescaledb.compress)")));
        assert!(statements.iter().any(|s| s.contains("add_compression_policy")));
    }
}

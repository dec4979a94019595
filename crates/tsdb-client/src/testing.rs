//! In-process scripted connection for tests.
//!
//! [`ScriptedConnector`] hands out connections that keep a statement log and
//! a tiny model of PostgreSQL transaction behaviour: inserts are buffered
//! until `COMMIT`, a failed statement aborts the open transaction until
//! `ROLLBACK` or `ROLLBACK TO SAVEPOINT`, and committing an aborted
//! transaction discards it. Failures are injected with [`fail_when`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use tsdb_client::testing::ScriptedConnector;
//! use tsdb_client::TimescaleClient;
//!
//! let db = ScriptedConnector::new().reject_event("bad");
//! let mut client = TimescaleClient::with_connector(config, Arc::new(db.clone()));
//! client.connect()?;
//! ```
//!
//! [`fail_when`]: ScriptedConnector::fail_when

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tsdb_config::ConnectionConfig;

use crate::connection::{Connection, Connector, DbError};
use crate::manager::Sleeper;
use crate::value::{Row, SqlValue};

type FailRule = Box<dyn Fn(&str, &[SqlValue]) -> Option<DbError> + Send + Sync>;

#[derive(Default)]
struct Txn {
    rows: Vec<Vec<SqlValue>>,
    savepoints: Vec<(String, usize)>,
    aborted: bool,
}

#[derive(Default)]
struct State {
    refuse_remaining: u32,
    connect_attempts: u32,
    statements: Vec<String>,
    rules: Vec<FailRule>,
    responses: Vec<(String, Vec<Row>)>,
    lost: bool,
    committed: Vec<Vec<SqlValue>>,
    pending: Option<Txn>,
}

/// Connector whose sessions run against an in-memory script.
///
/// Clones share state, so a test keeps one clone for assertions and gives
/// another to the client.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_connections(self, n: u32) -> Self {
        lock(&self.state).refuse_remaining = n;
        self
    }

    /// Fail any statement for which `rule` returns an error.
    pub fn fail_when<F>(self, rule: F) -> Self
    where
        F: Fn(&str, &[SqlValue]) -> Option<DbError> + Send + Sync + 'static,
    {
        lock(&self.state).rules.push(Box::new(rule));
        self
    }

    /// Fail statements whose SQL contains `fragment` with a statement error.
    pub fn fail_statements_containing(self, fragment: &str) -> Self {
        let fragment = fragment.to_string();
        self.fail_when(move |sql, _| {
            sql.contains(&fragment)
                .then(|| DbError::statement(format!("scripted failure: {}", fragment)))
        })
    }

    /// Reject inserts of events named `eventname`, like a constraint would.
    pub fn reject_event(self, eventname: &str) -> Self {
        let name = SqlValue::Text(eventname.to_string());
        self.fail_when(move |sql, params| {
            (sql.starts_with("INSERT INTO") && params.get(1) == Some(&name)).then(|| {
                DbError::statement("23514: new row violates check constraint")
            })
        })
    }

    /// Lose the session while inserting events named `eventname`.
    pub fn lose_connection_on_event(self, eventname: &str) -> Self {
        let name = SqlValue::Text(eventname.to_string());
        self.fail_when(move |sql, params| {
            (sql.starts_with("INSERT INTO") && params.get(1) == Some(&name))
                .then(|| DbError::connection("server closed the connection unexpectedly"))
        })
    }

    /// Return `rows` for queries whose SQL contains `fragment`.
    pub fn respond(self, fragment: &str, rows: Vec<Row>) -> Self {
        lock(&self.state)
            .responses
            .push((fragment.to_string(), rows));
        self
    }

    /// Drop the current session; later statements fail until reconnect.
    pub fn drop_connection(&self) {
        let mut state = lock(&self.state);
        state.lost = true;
        state.pending = None;
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    /// Every statement sent, in order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state).statements.clone()
    }

    pub fn clear_statements(&self) {
        lock(&self.state).statements.clear();
    }

    /// Parameters of every committed insert.
    pub fn committed_rows(&self) -> Vec<Vec<SqlValue>> {
        lock(&self.state).committed.clone()
    }

    pub fn in_transaction(&self) -> bool {
        lock(&self.state).pending.is_some()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>, DbError> {
        let mut state = lock(&self.state);
        state.connect_attempts += 1;
        if state.refuse_remaining > 0 {
            state.refuse_remaining -= 1;
            return Err(DbError::connection("connection refused"));
        }
        state.lost = false;
        state.pending = None;
        Ok(Box::new(ScriptedConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<State>>,
}

fn single(name: &str, value: Value) -> Vec<Row> {
    let mut row = Row::new();
    row.insert(name.to_string(), value);
    vec![row]
}

impl ScriptedConnection {
    fn run(&self, sql: &str, params: &[SqlValue]) -> Result<(u64, Vec<Row>), DbError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let sql = sql.trim();
        state.statements.push(sql.to_string());

        if state.lost {
            return Err(DbError::connection("connection is closed"));
        }

        if let Some(err) = state.rules.iter().find_map(|rule| rule(sql, params)) {
            if err.is_connection() {
                state.lost = true;
                state.pending = None;
            } else if let Some(txn) = state.pending.as_mut() {
                txn.aborted = true;
            }
            return Err(err);
        }

        let upper = sql.to_ascii_uppercase();
        let ends_block = upper == "COMMIT" || upper.starts_with("ROLLBACK");
        if let Some(txn) = state.pending.as_ref() {
            if txn.aborted && !ends_block {
                return Err(DbError::statement(
                    "25P02: current transaction is aborted, commands ignored until end of transaction block",
                ));
            }
        }

        if upper == "BEGIN" {
            state.pending = Some(Txn::default());
            return Ok((0, Vec::new()));
        }
        if upper == "COMMIT" {
            if let Some(txn) = state.pending.take() {
                if !txn.aborted {
                    state.committed.extend(txn.rows);
                }
            }
            return Ok((0, Vec::new()));
        }
        if upper == "ROLLBACK" {
            state.pending = None;
            return Ok((0, Vec::new()));
        }
        if let Some(name) = upper.strip_prefix("SAVEPOINT ") {
            let txn = state.pending.as_mut().ok_or_else(|| {
                DbError::statement("25P01: SAVEPOINT can only be used in transaction blocks")
            })?;
            txn.savepoints.push((name.to_string(), txn.rows.len()));
            return Ok((0, Vec::new()));
        }
        if let Some(name) = upper.strip_prefix("RELEASE SAVEPOINT ") {
            let txn = state
                .pending
                .as_mut()
                .ok_or_else(|| DbError::statement("25P01: no transaction in progress"))?;
            if let Some(pos) = txn.savepoints.iter().rposition(|(n, _)| n == name) {
                txn.savepoints.truncate(pos);
            }
            return Ok((0, Vec::new()));
        }
        if let Some(name) = upper.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            let txn = state
                .pending
                .as_mut()
                .ok_or_else(|| DbError::statement("25P01: no transaction in progress"))?;
            let pos = txn
                .savepoints
                .iter()
                .rposition(|(n, _)| n == name)
                .ok_or_else(|| DbError::statement("3B001: savepoint does not exist"))?;
            let mark = txn.savepoints[pos].1;
            txn.savepoints.truncate(pos + 1);
            txn.rows.truncate(mark);
            txn.aborted = false;
            return Ok((0, Vec::new()));
        }
        if upper.starts_with("INSERT INTO") {
            match state.pending.as_mut() {
                Some(txn) => txn.rows.push(params.to_vec()),
                None => state.committed.push(params.to_vec()),
            }
            return Ok((1, Vec::new()));
        }

        if let Some((_, rows)) = state
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Ok((rows.len() as u64, rows.clone()));
        }
        if upper.contains("COUNT(*)") {
            return Ok((1, single("count", Value::from(state.committed.len() as i64))));
        }
        if upper == "SELECT 1" {
            return Ok((1, single("?column?", Value::from(1))));
        }
        Ok((0, Vec::new()))
    }
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        self.run(sql, params).map(|(affected, _)| affected)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        self.run(sql, params).map(|(_, rows)| rows)
    }

    fn batch_execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.run(sql, &[]).map(|_| ())
    }
}

/// Sleeper that records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

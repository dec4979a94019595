//! Transactional batch insertion with per-row failure isolation.
//!
//! Each row runs inside its own savepoint. A row the server rejects is
//! rolled back to that savepoint and the rest of the batch still commits.

use std::slice;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::client::TimescaleClient;
use crate::connection::{Connection, DbError};
use crate::error::{ClientError, ClientResult};
use crate::record::EventRecord;

const ROW_SAVEPOINT: &str = "tsdb_row";

/// Per-batch accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub written: usize,
    pub failed: usize,
}

impl BatchOutcome {
    /// An empty batch succeeds; otherwise at least one row must be written.
    pub fn succeeded(&self) -> bool {
        self.attempted == 0 || self.written > 0
    }
}

impl TimescaleClient {
    /// Write records in one transaction.
    ///
    /// Returns true when the input is empty or at least one row committed.
    pub fn write_points(&mut self, records: &[EventRecord]) -> bool {
        match self.write_batch(records) {
            Ok(outcome) => outcome.succeeded(),
            Err(_) => false,
        }
    }

    /// Write a single record.
    pub fn write_point(&mut self, record: &EventRecord) -> bool {
        self.write_points(slice::from_ref(record))
    }

    /// [`write_points`](Self::write_points) with full accounting.
    ///
    /// `Err` means the batch as a whole faulted: not connected, or a
    /// transaction-level or connection-level failure. Nothing from a
    /// faulted batch is committed.
    pub fn write_batch(&mut self, records: &[EventRecord]) -> ClientResult<BatchOutcome> {
        let mut outcome = BatchOutcome {
            attempted: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(outcome);
        }

        let conn = match self.manager.require() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(events = records.len(), "TimescaleDB not connected, skipping write");
                return Err(e);
            }
        };

        match insert_all(conn, &self.insert_sql, records, &mut outcome) {
            Ok(()) => {
                info!(
                    table = %self.table,
                    written = outcome.written,
                    failed = outcome.failed,
                    attempted = outcome.attempted,
                    "event batch committed"
                );
                Ok(outcome)
            }
            Err(fault) => {
                error!(
                    table = %self.table,
                    attempted = outcome.attempted,
                    error = %fault,
                    "event batch failed, rolling back"
                );
                self.abort(&fault);
                Err(ClientError::Query(fault))
            }
        }
    }

    fn abort(&mut self, fault: &DbError) {
        if fault.is_connection() {
            self.manager.mark_lost();
            return;
        }
        let Some(conn) = self.manager.connection_mut() else {
            return;
        };
        if let Err(e) = conn.batch_execute("ROLLBACK") {
            warn!(error = %e, "rollback failed");
            if e.is_connection() {
                self.manager.mark_lost();
            }
        }
    }
}

fn insert_all(
    conn: &mut dyn Connection,
    sql: &str,
    records: &[EventRecord],
    outcome: &mut BatchOutcome,
) -> Result<(), DbError> {
    conn.batch_execute("BEGIN")?;

    for (index, record) in records.iter().enumerate() {
        let params = match record.to_params() {
            Ok(params) => params,
            Err(e) => {
                warn!(index, error = %e, "skipping event");
                outcome.failed += 1;
                continue;
            }
        };

        conn.batch_execute(&format!("SAVEPOINT {ROW_SAVEPOINT}"))?;
        match conn.execute(sql, &params) {
            Ok(_) => {
                conn.batch_execute(&format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"))?;
                outcome.written += 1;
            }
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                warn!(
                    index,
                    eventname = record.eventname.as_deref().unwrap_or(""),
                    error = %e,
                    "event insert failed"
                );
                conn.batch_execute(&format!("ROLLBACK TO SAVEPOINT {ROW_SAVEPOINT}"))?;
                conn.batch_execute(&format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"))?;
                outcome.failed += 1;
            }
        }
    }

    conn.batch_execute("COMMIT")
}

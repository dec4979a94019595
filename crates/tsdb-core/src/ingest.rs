//! Bulk loading of JSON-lines event files.

use std::io::BufRead;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use tsdb_client::EventRecord;

use crate::store::{LogStore, StoreError, TsdbStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<IngestError> for tsdb_common::Error {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Io(e) => tsdb_common::Error::Io(e),
            IngestError::Parse { .. } => tsdb_common::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string(),
            )),
            IngestError::Store(StoreError::Client(e)) => e.into(),
            IngestError::Store(e) => tsdb_common::Error::Query(e.to_string()),
        }
    }
}

/// Parse one [`EventRecord`] per non-blank line.
pub fn read_event_lines<R: BufRead>(reader: R) -> Result<Vec<EventRecord>, IngestError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| IngestError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Totals for one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub batches: usize,
    pub written: usize,
    pub failed: usize,
}

/// Write `records` through `store` in batches of `batch_size`.
///
/// A batch whose rows were all rejected is counted and skipped; a batch
/// that faults stops the run.
pub fn ingest(
    store: &mut TsdbStore,
    records: Vec<EventRecord>,
    batch_size: usize,
) -> Result<IngestSummary, IngestError> {
    let batch_size = batch_size.max(1);
    let mut summary = IngestSummary::default();
    let mut records = records.into_iter().peekable();

    while records.peek().is_some() {
        store.extend(records.by_ref().take(batch_size));
        let attempted = store.pending();
        summary.batches += 1;
        match store.flush() {
            Ok(written) => {
                summary.written += written;
                summary.failed += attempted - written;
            }
            Err(StoreError::AllRejected { attempted }) => {
                warn!(batch = summary.batches, attempted, "every event in batch rejected");
                summary.failed += attempted;
            }
            Err(e) => return Err(IngestError::Store(e)),
        }
    }

    info!(
        batches = summary.batches,
        written = summary.written,
        failed = summary.failed,
        "ingest finished"
    );
    Ok(summary)
}

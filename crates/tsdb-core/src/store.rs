//! Log stores the flush task can drain.

use thiserror::Error;
use tracing::{debug, info};
use tsdb_client::{ClientError, EventRecord, TimescaleClient};

/// Name the TimescaleDB store registers under.
pub const TSDB_STORE_NAME: &str = "logstore_tsdb";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("all {attempted} pending events were rejected")]
    AllRejected { attempted: usize },
}

/// A store holding events that have not reached the database yet.
pub trait LogStore: Send {
    fn name(&self) -> &str;

    /// Write pending events, returning how many were stored.
    fn flush(&mut self) -> Result<usize, StoreError>;

    /// Flush and release resources. The store is not used afterwards.
    fn dispose(&mut self) -> Result<(), StoreError> {
        self.flush().map(|_| ())
    }
}

/// Store that hands pending events to a [`TimescaleClient`] on flush.
///
/// Events stay pending when the batch faults as a whole (nothing was
/// committed), so the next flush retries them. Rows the server rejected
/// individually are dropped.
#[derive(Debug)]
pub struct TsdbStore {
    client: TimescaleClient,
    pending: Vec<EventRecord>,
}

impl TsdbStore {
    pub fn new(client: TimescaleClient) -> Self {
        TsdbStore {
            client,
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, record: EventRecord) {
        self.pending.push(record);
    }

    pub fn extend<I: IntoIterator<Item = EventRecord>>(&mut self, records: I) {
        self.pending.extend(records);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn client_mut(&mut self) -> &mut TimescaleClient {
        &mut self.client
    }
}

impl LogStore for TsdbStore {
    fn name(&self) -> &str {
        TSDB_STORE_NAME
    }

    fn flush(&mut self) -> Result<usize, StoreError> {
        if self.pending.is_empty() {
            debug!(store = TSDB_STORE_NAME, "nothing to flush");
            return Ok(0);
        }
        let outcome = self.client.write_batch(&self.pending)?;
        self.pending.clear();
        if !outcome.succeeded() {
            return Err(StoreError::AllRejected {
                attempted: outcome.attempted,
            });
        }
        Ok(outcome.written)
    }

    fn dispose(&mut self) -> Result<(), StoreError> {
        let result = self.flush();
        self.client.close();
        info!(store = TSDB_STORE_NAME, "store disposed");
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tsdb_client::testing::ScriptedConnector;
    use tsdb_config::ConnectionConfig;

    fn store(db: &ScriptedConnector) -> TsdbStore {
        let config = ConnectionConfig::new("h", 5433, "db", "u", "p", "events").unwrap();
        let mut client = TimescaleClient::with_connector(config, Arc::new(db.clone()));
        client.connect().unwrap();
        TsdbStore::new(client)
    }

    #[test]
    fn test_flush_writes_and_clears() {
        let db = ScriptedConnector::new();
        let mut store = store(&db);
        store.extend((0..3).map(|i| EventRecord::new(i, "e")));
        assert_eq!(store.flush().unwrap(), 3);
        assert_eq!(store.pending(), 0);
        assert_eq!(store.flush().unwrap(), 0);
        assert_eq!(db.committed_rows().len(), 3);
    }

    #[test]
    fn test_fault_keeps_events_pending() {
        let db = ScriptedConnector::new();
        let mut store = store(&db);
        store.push(EventRecord::new(1, "e"));
        store.client_mut().close();
        assert!(matches!(
            store.flush(),
            Err(StoreError::Client(ClientError::NotConnected))
        ));
        assert_eq!(store.pending(), 1);

        store.client_mut().connect().unwrap();
        assert_eq!(store.flush().unwrap(), 1);
    }

    #[test]
    fn test_all_rejected_drops_events() {
        let db = ScriptedConnector::new().reject_event("bad");
        let mut store = store(&db);
        store.push(EventRecord::new(1, "bad"));
        assert!(matches!(
            store.flush(),
            Err(StoreError::AllRejected { attempted: 1 })
        ));
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_dispose_flushes_and_closes() {
        let db = ScriptedConnector::new();
        let mut store = store(&db);
        store.push(EventRecord::new(1, "e"));
        store.dispose().unwrap();
        assert_eq!(db.committed_rows().len(), 1);
        assert!(!store.client_mut().is_connected());
    }
}

//! Periodic flush of registered log stores.
//!
//! Stores are registered explicitly; the task flushes each one and keeps
//! going when one of them fails.

use serde::Serialize;
use tracing::{info, warn};

use crate::store::LogStore;

/// Stores known to the flush task.
#[derive(Default)]
pub struct StoreRegistry {
    stores: Vec<Box<dyn LogStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, store: Box<dyn LogStore>) {
        info!(store = store.name(), "log store registered");
        self.stores.push(store);
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.name().to_string()).collect()
    }

    /// Dispose every store and empty the registry.
    pub fn dispose_all(&mut self) -> FlushSummary {
        let mut summary = FlushSummary::default();
        for mut store in self.stores.drain(..) {
            let name = store.name().to_string();
            match store.dispose() {
                Ok(()) => summary.flushed.push(name),
                Err(e) => {
                    warn!(store = %name, error = %e, "dispose failed");
                    summary.failed.push(StoreFailure {
                        store: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        summary
    }
}

/// A store that could not be flushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreFailure {
    pub store: String,
    pub error: String,
}

/// Result of one flush run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub flushed: Vec<String>,
    pub failed: Vec<StoreFailure>,
    pub events_written: usize,
}

impl FlushSummary {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Scheduled task writing buffered events out.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushTask;

impl FlushTask {
    pub fn name(&self) -> &'static str {
        "Flush buffered log events"
    }

    /// Flush every registered store.
    pub fn execute(&self, registry: &mut StoreRegistry) -> FlushSummary {
        let mut summary = FlushSummary::default();
        if registry.is_empty() {
            info!("no log stores registered");
            return summary;
        }

        for store in registry.stores.iter_mut() {
            let name = store.name().to_string();
            info!(store = %name, "flushing buffer");
            match store.flush() {
                Ok(written) => {
                    info!(store = %name, written, "buffer flushed");
                    summary.events_written += written;
                    summary.flushed.push(name);
                }
                Err(e) => {
                    warn!(store = %name, error = %e, "buffer flush failed");
                    summary.failed.push(StoreFailure {
                        store: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        summary
    }
}

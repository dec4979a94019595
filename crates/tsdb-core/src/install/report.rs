//! What an installation run found and changed.

use serde::Serialize;

/// Outcome of one `CREATE INDEX IF NOT EXISTS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compression state after installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompressionStatus {
    /// Compression enabled; `policy_after_hours` is set when a policy was
    /// registered.
    Enabled { policy_after_hours: Option<u64> },
    /// Not attempted because the table is not a hypertable.
    Skipped,
    /// Attempted and refused by the server.
    Failed { error: String },
}

/// Installation state of the event table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// `schema.table`, unquoted.
    pub table: String,
    pub timescaledb_available: bool,
    pub hypertable: bool,
    pub indexes: Vec<IndexStatus>,
    pub compression: CompressionStatus,
    /// Non-fatal step failures, in order.
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub(crate) fn new(table: String) -> Self {
        InstallReport {
            table,
            timescaledb_available: false,
            hypertable: false,
            indexes: Vec::new(),
            compression: CompressionStatus::Skipped,
            warnings: Vec::new(),
        }
    }

    /// Every optional step succeeded.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn compression_enabled(&self) -> bool {
        matches!(self.compression, CompressionStatus::Enabled { .. })
    }

    /// Short human summary, one line per step.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("table {} ready", self.table)];
        lines.push(match (self.timescaledb_available, self.hypertable) {
            (false, _) => "timescaledb extension not found; plain table".to_string(),
            (true, true) => "hypertable confirmed".to_string(),
            (true, false) => "table is NOT a hypertable".to_string(),
        });
        for index in &self.indexes {
            lines.push(match &index.error {
                None => format!("index {} ok", index.name),
                Some(e) => format!("index {} failed: {}", index.name, e),
            });
        }
        lines.push(match &self.compression {
            CompressionStatus::Enabled {
                policy_after_hours: Some(h),
            } => format!("compression enabled, policy after {}h", h),
            CompressionStatus::Enabled { policy_after_hours: None } => {
                "compression enabled, no policy".to_string()
            }
            CompressionStatus::Skipped => "compression skipped".to_string(),
            CompressionStatus::Failed { error } => format!("compression failed: {}", error),
        });
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_serializes_tagged() {
        let json = serde_json::to_value(CompressionStatus::Enabled {
            policy_after_hours: Some(168),
        })
        .unwrap();
        assert_eq!(json["status"], "enabled");
        assert_eq!(json["policy_after_hours"], 168);
    }

    #[test]
    fn test_summary_for_plain_postgres() {
        let report = InstallReport::new("public.events".into());
        let lines = report.summary_lines();
        assert_eq!(lines[0], "table public.events ready");
        assert!(lines[1].contains("not found"));
        assert_eq!(lines.last().unwrap(), "compression skipped");
        assert!(report.is_complete());
    }
}

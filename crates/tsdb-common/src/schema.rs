//! Event table schema.
//!
//! Columns defined (in table order):
//! - `id`: auto-increment identity, keyed together with `time`
//! - `time`: event timestamp, the hypertable partitioning column
//! - event identity (`eventname`, `component`, `action`, `target`, `crud`)
//! - audit context (`edulevel`, `anonymous`, course/context/user ids)
//! - origin metadata (`ip`, `origin`) and the encoded `other` payload

/// A single column of the event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    /// Column type and constraints as written in `CREATE TABLE`.
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef { name, sql_type }
}

/// Every column of the event table, in creation order.
pub const EVENT_COLUMNS: &[ColumnDef] = &[
    col("id", "BIGSERIAL"),
    col("time", "TIMESTAMPTZ NOT NULL"),
    col("eventname", "VARCHAR(255) NOT NULL"),
    col("component", "VARCHAR(100)"),
    col("action", "VARCHAR(100)"),
    col("target", "VARCHAR(100)"),
    col("crud", "CHAR(1)"),
    col("edulevel", "INT"),
    col("anonymous", "INT DEFAULT 0"),
    col("courseid", "BIGINT"),
    col("contextid", "BIGINT"),
    col("contextlevel", "INT"),
    col("contextinstanceid", "BIGINT"),
    col("userid", "BIGINT"),
    col("relateduserid", "BIGINT"),
    col("realuserid", "BIGINT"),
    col("objectid", "BIGINT"),
    col("objecttable", "VARCHAR(255)"),
    col("timecreated", "BIGINT"),
    col("ip", "VARCHAR(45)"),
    col("origin", "VARCHAR(20) DEFAULT 'web'"),
    col("other", "TEXT"),
];

/// Columns written by the batch writer, in parameter order ($1..$20).
pub const INSERT_COLUMNS: [&str; 20] = [
    "time",
    "eventname",
    "component",
    "action",
    "target",
    "crud",
    "edulevel",
    "anonymous",
    "courseid",
    "contextid",
    "contextlevel",
    "contextinstanceid",
    "userid",
    "relateduserid",
    "realuserid",
    "objectid",
    "objecttable",
    "ip",
    "origin",
    "other",
];

/// Columns a caller may order listings by.
pub const ORDERABLE_COLUMNS: [&str; 5] = ["time", "eventname", "component", "userid", "courseid"];

/// Primary key columns. Hypertables only accept unique keys that include
/// the partitioning column.
pub const PRIMARY_KEY: [&str; 2] = ["id", "time"];

/// Partition span for the hypertable.
pub const CHUNK_INTERVAL: &str = "1 day";

/// `CREATE TABLE IF NOT EXISTS` for the event table.
///
/// `qualified` must already be quoted (see [`crate::qualified_name`]).
pub fn create_table_sql(qualified: &str) -> String {
    let mut lines = EVENT_COLUMNS
        .iter()
        .map(|c| format!("    {} {}", crate::quote_ident(c.name), c.sql_type))
        .collect::<Vec<_>>();
    let key = PRIMARY_KEY
        .iter()
        .map(|c| crate::quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!("    PRIMARY KEY ({})", key));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        qualified,
        lines.join(",\n")
    )
}

/// Parameterized single-row INSERT of [`INSERT_COLUMNS`].
pub fn insert_sql(qualified: &str) -> String {
    let placeholders = (1..=INSERT_COLUMNS.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified,
        INSERT_COLUMNS.join(", "),
        placeholders
    )
}

/// An index the installer maintains on the event table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    /// Key list as written inside the parentheses.
    pub keys: &'static str,
}

/// Indexes created for `table`: recent-first scans and per-user timelines.
pub fn index_definitions(table: &str) -> Vec<IndexDef> {
    vec![
        IndexDef {
            name: format!("idx_{}_time", table),
            keys: "time DESC",
        },
        IndexDef {
            name: format!("idx_{}_userid", table),
            keys: "time DESC, userid",
        },
    ]
}

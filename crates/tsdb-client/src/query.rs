//! Read-side helpers and raw parameterized primitives.
//!
//! The helpers degrade instead of failing: a count is 0, a listing is
//! empty, a single value is `None`. Failures are logged.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::TimescaleClient;
use crate::error::{ClientError, ClientResult};
use crate::sanitize::{coerce_limit, coerce_offset, validate_order_by, DEFAULT_ORDER_BY};
use crate::value::{Row, SqlValue};

/// Rows returned when the caller does not say how many.
pub const DEFAULT_LIMIT: i64 = 100;

/// Statistics window when no bounds are given.
pub const DEFAULT_STATISTICS_WINDOW_HOURS: i64 = 24;

/// Filter, ordering and paging for [`TimescaleClient::get_events`].
///
/// `filter` is a trusted SQL boolean expression with `$n` placeholders for
/// `params`. Ordering goes through the allow-list; paging is coerced to
/// non-negative integers.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub filter: Option<String>,
    pub params: Vec<SqlValue>,
    pub order_by: String,
    pub limit: i64,
    pub offset: i64,
}

impl Default for EventQuery {
    fn default() -> Self {
        EventQuery {
            filter: None,
            params: Vec::new(),
            order_by: DEFAULT_ORDER_BY.to_string(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.filter = Some(filter.into());
        self.params = params;
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Statement text against `table` (already quoted).
    pub fn to_sql(&self, table: &str) -> String {
        let mut sql = format!("SELECT * FROM {}", table);
        push_filter(&mut sql, self.filter.as_deref());
        sql.push_str(&format!(
            " ORDER BY {} LIMIT {} OFFSET {}",
            validate_order_by(&self.order_by),
            coerce_limit(self.limit),
            coerce_offset(self.offset)
        ));
        sql
    }
}

fn push_filter(sql: &mut String, filter: Option<&str>) {
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
}

fn first_value(rows: &[Row]) -> Option<&Value> {
    rows.first().and_then(|row| row.values().next())
}

impl TimescaleClient {
    /// Run a parameterized query on the open session.
    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> ClientResult<Vec<Row>> {
        let result = self.manager.require()?.query(sql, params);
        result.map_err(|e| self.query_failed(sql, e))
    }

    /// Run a parameterized statement on the open session.
    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> ClientResult<u64> {
        let result = self.manager.require()?.execute(sql, params);
        result.map_err(|e| self.query_failed(sql, e))
    }

    fn query_failed(&mut self, sql: &str, e: crate::connection::DbError) -> ClientError {
        warn!(sql = %sql, error = %e, "query failed");
        if e.is_connection() {
            self.manager.mark_lost();
        }
        ClientError::Query(e)
    }

    /// Number of events matching `filter` (all events when `None`).
    pub fn count_events(&mut self, filter: Option<&str>, params: &[SqlValue]) -> i64 {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        push_filter(&mut sql, filter);
        match self.query(&sql, params) {
            Ok(rows) => first_value(&rows).and_then(Value::as_i64).unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Events matching `query`, or an empty list on failure.
    pub fn get_events(&mut self, query: &EventQuery) -> Vec<Row> {
        let sql = query.to_sql(&self.table);
        debug!(sql = %sql, "fetching events");
        self.query(&sql, &query.params).unwrap_or_default()
    }

    /// Aggregate statistics between `start` and `end`.
    ///
    /// Missing bounds default to the 24 hours before now.
    pub fn get_statistics(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Option<Row> {
        let now = Utc::now();
        let start = start.unwrap_or(now - Duration::hours(DEFAULT_STATISTICS_WINDOW_HOURS));
        let end = end.unwrap_or(now);
        self.query(
            "SELECT * FROM get_event_statistics($1, $2)",
            &[SqlValue::Timestamp(start), SqlValue::Timestamp(end)],
        )
        .ok()
        .and_then(|rows| rows.into_iter().next())
    }

    /// Server version string.
    pub fn get_version(&mut self) -> Option<String> {
        self.scalar_text("SELECT version()")
    }

    /// Installed `timescaledb` extension version, if any.
    pub fn get_extension_version(&mut self) -> Option<String> {
        self.scalar_text("SELECT extversion FROM pg_extension WHERE extname = 'timescaledb'")
    }

    fn scalar_text(&mut self, sql: &str) -> Option<String> {
        let rows = self.query(sql, &[]).ok()?;
        first_value(&rows)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

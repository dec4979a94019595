//! ORDER BY allow-listing and LIMIT/OFFSET coercion.
//!
//! Caller-supplied ordering is spliced into SQL text, so it is rebuilt from
//! an allow-list instead of being escaped.

use std::fmt;

use tracing::debug;
use tsdb_common::ORDERABLE_COLUMNS;

/// Ordering used when the requested column is not allowed.
pub const DEFAULT_ORDER_BY: &str = "time DESC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if token.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A validated ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: &'static str,
    pub direction: Direction,
}

impl Default for OrderSpec {
    fn default() -> Self {
        OrderSpec {
            column: "time",
            direction: Direction::Desc,
        }
    }
}

impl OrderSpec {
    /// Parse caller input into an allowed ordering.
    ///
    /// Only the first two whitespace-separated tokens are considered.
    /// Unknown or missing columns fall back to `time DESC`; a known column
    /// with a missing or unrecognised direction sorts ascending.
    pub fn parse(raw: &str) -> Self {
        let mut tokens = raw.split_whitespace();
        let requested = tokens.next().unwrap_or("");

        let Some(column) = ORDERABLE_COLUMNS
            .iter()
            .copied()
            .find(|c| *c == requested)
        else {
            debug!(
                requested = %raw,
                fallback = DEFAULT_ORDER_BY,
                "order by column not allowed"
            );
            return OrderSpec::default();
        };

        let direction = tokens.next().and_then(Direction::parse).unwrap_or_default();
        OrderSpec { column, direction }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Rebuild an ORDER BY clause from the allow-list.
pub fn validate_order_by(raw: &str) -> String {
    OrderSpec::parse(raw).to_string()
}

/// LIMIT as a non-negative integer.
pub fn coerce_limit(limit: i64) -> i64 {
    limit.max(0)
}

/// OFFSET as a non-negative integer.
pub fn coerce_offset(offset: i64) -> i64 {
    offset.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_column_with_direction() {
        assert_eq!(validate_order_by("userid DESC"), "userid DESC");
        assert_eq!(validate_order_by("eventname asc"), "eventname ASC");
        assert_eq!(validate_order_by("component Desc"), "component DESC");
    }

    #[test]
    fn test_unknown_column_falls_back() {
        assert_eq!(validate_order_by("dropme"), "time DESC");
        assert_eq!(validate_order_by("id; DROP TABLE x"), "time DESC");
        assert_eq!(validate_order_by(""), "time DESC");
        assert_eq!(validate_order_by("   "), "time DESC");
    }

    #[test]
    fn test_missing_or_bad_direction_is_asc() {
        assert_eq!(validate_order_by("courseid"), "courseid ASC");
        assert_eq!(validate_order_by("time sideways"), "time ASC");
        assert_eq!(validate_order_by("userid DESC; DELETE"), "userid DESC");
    }

    #[test]
    fn test_column_match_is_exact() {
        assert_eq!(validate_order_by("TIME DESC"), "time DESC");
        assert_eq!(
            OrderSpec::parse("TIME ASC"),
            OrderSpec {
                column: "time",
                direction: Direction::Desc
            }
        );
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce_limit(-5), 0);
        assert_eq!(coerce_limit(100), 100);
        assert_eq!(coerce_offset(-1), 0);
        assert_eq!(coerce_offset(20), 20);
    }
}

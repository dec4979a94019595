//! Event records and their mapping onto the insert statement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tsdb_common::INSERT_COLUMNS;

use crate::value::SqlValue;

/// A record that cannot be turned into insert parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("event time {0} is outside the representable range")]
    TimeOutOfRange(i64),
}

/// One event as handed over by the host.
///
/// `time` is Unix seconds and must be present. Every other field is
/// optional and takes the store default when absent (see
/// [`EventRecord::to_params`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(alias = "timecreated")]
    pub time: i64,
    pub eventname: Option<String>,
    pub component: Option<String>,
    pub action: Option<String>,
    pub target: Option<String>,
    pub crud: Option<String>,
    pub edulevel: Option<i64>,
    pub anonymous: Option<i64>,
    pub courseid: Option<i64>,
    pub contextid: Option<i64>,
    pub contextlevel: Option<i64>,
    pub contextinstanceid: Option<i64>,
    pub userid: Option<i64>,
    pub relateduserid: Option<i64>,
    pub realuserid: Option<i64>,
    pub objectid: Option<i64>,
    pub objecttable: Option<String>,
    pub ip: Option<String>,
    pub origin: Option<String>,
    /// Structured payload, or text that is already encoded.
    pub other: Option<Value>,
}

impl EventRecord {
    pub fn new(time: i64, eventname: impl Into<String>) -> Self {
        EventRecord {
            time,
            eventname: Some(eventname.into()),
            ..Default::default()
        }
    }

    /// Event time as a UTC timestamp.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, RecordError> {
        DateTime::from_timestamp(self.time, 0).ok_or(RecordError::TimeOutOfRange(self.time))
    }

    /// Insert parameters in [`INSERT_COLUMNS`] order, defaults applied.
    pub fn to_params(&self) -> Result<Vec<SqlValue>, RecordError> {
        let zero = |v: Option<i64>| SqlValue::Int(v.unwrap_or(0));
        let text = |v: &Option<String>| SqlValue::from(v.clone());

        let params = vec![
            SqlValue::Timestamp(self.timestamp()?),
            text(&self.eventname),
            text(&self.component),
            text(&self.action),
            text(&self.target),
            text(&self.crud),
            zero(self.edulevel),
            zero(self.anonymous),
            zero(self.courseid),
            zero(self.contextid),
            zero(self.contextlevel),
            zero(self.contextinstanceid),
            zero(self.userid),
            SqlValue::from(self.relateduserid),
            SqlValue::from(self.realuserid),
            SqlValue::from(self.objectid),
            text(&self.objecttable),
            text(&self.ip),
            SqlValue::Text(self.origin.clone().unwrap_or_else(|| "web".to_string())),
            format_other(self.other.as_ref()),
        ];
        debug_assert_eq!(params.len(), INSERT_COLUMNS.len());
        Ok(params)
    }
}

/// Encode the `other` payload for its TEXT column.
///
/// Strings are passed through untouched so pre-encoded JSON is not encoded
/// twice. Empty payloads become NULL.
pub fn format_other(other: Option<&Value>) -> SqlValue {
    match other {
        None | Some(Value::Null) | Some(Value::Bool(false)) => SqlValue::Null,
        Some(Value::String(s)) if s.is_empty() => SqlValue::Null,
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => SqlValue::Null,
        Some(Value::Array(a)) if a.is_empty() => SqlValue::Null,
        Some(Value::Object(o)) if o.is_empty() => SqlValue::Null,
        Some(v) => SqlValue::Text(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_applied() {
        let params = EventRecord::new(1_700_000_000, "\\core\\event\\user_loggedin")
            .to_params()
            .unwrap();
        assert_eq!(params.len(), 20);
        assert!(matches!(params[0], SqlValue::Timestamp(_)));
        assert_eq!(params[1], SqlValue::Text("\\core\\event\\user_loggedin".into()));
        assert!(params[2].is_null());
        // edulevel..userid
        for p in &params[6..13] {
            assert_eq!(*p, SqlValue::Int(0));
        }
        // relateduserid, realuserid, objectid, objecttable, ip
        for p in &params[13..18] {
            assert!(p.is_null());
        }
        assert_eq!(params[18], SqlValue::Text("web".into()));
        assert!(params[19].is_null());
    }

    #[test]
    fn test_time_is_seconds() {
        let record = EventRecord::new(86_400, "e");
        assert_eq!(record.timestamp().unwrap().to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_time_out_of_range() {
        let record = EventRecord::new(i64::MAX, "e");
        assert_eq!(
            record.to_params().unwrap_err(),
            RecordError::TimeOutOfRange(i64::MAX)
        );
    }

    #[test]
    fn test_format_other() {
        assert_eq!(
            format_other(Some(&json!({"b": [1, 2], "a": "x"}))),
            SqlValue::Text(r#"{"b":[1,2],"a":"x"}"#.into())
        );
        assert_eq!(
            format_other(Some(&json!(r#"{"already":"encoded"}"#))),
            SqlValue::Text(r#"{"already":"encoded"}"#.into())
        );
        for empty in [json!(null), json!(""), json!({}), json!([]), json!(false), json!(0)] {
            assert!(format_other(Some(&empty)).is_null(), "{empty}");
        }
        assert!(format_other(None).is_null());
        assert_eq!(format_other(Some(&json!(5))), SqlValue::Text("5".into()));
    }

    #[test]
    fn test_deserialize_json_line() {
        let record: EventRecord = serde_json::from_str(
            r#"{"timecreated": 1700000000, "eventname": "e", "userid": 4, "other": {"k": 1}}"#,
        )
        .unwrap();
        assert_eq!(record.time, 1_700_000_000);
        assert_eq!(record.userid, Some(4));
        let params = record.to_params().unwrap();
        assert_eq!(params[12], SqlValue::Int(4));
        assert_eq!(params[19], SqlValue::Text(r#"{"k":1}"#.into()));
    }

    #[test]
    fn test_deserialize_requires_time() {
        let err = serde_json::from_str::<EventRecord>(r#"{"eventname": "e", "userid": 4}"#)
            .unwrap_err();
        assert!(err.to_string().contains("missing field `time`"), "{err}");

        let record: EventRecord = serde_json::from_str(r#"{"time": 5}"#).unwrap();
        assert_eq!(record, EventRecord { time: 5, ..Default::default() });
    }
}

//! Positional parameter values and result rows.

use std::error::Error as StdError;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use serde_json::Value;

/// A result row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// A positional query parameter.
///
/// Integers are sent at whatever width the server declares for the
/// placeholder, so callers never need to know whether a column is
/// `INT` or `BIGINT`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Plain rendering for log lines.
    pub fn describe(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Json(v) => v.to_string(),
            SqlValue::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

type EncodeResult = Result<IsNull, Box<dyn StdError + Sync + Send>>;

fn mismatch(value: &SqlValue, ty: &Type) -> Box<dyn StdError + Sync + Send> {
    format!("cannot send {} as {}", value.describe(), ty).into()
}

fn encode_int(v: i64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        _ if <String as ToSql>::accepts(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch(&SqlValue::Int(v), ty)),
    }
}

fn encode_timestamp(t: &DateTime<Utc>, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::TIMESTAMPTZ => t.to_sql(ty, out),
        Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
        _ if <String as ToSql>::accepts(ty) => t.to_rfc3339().to_sql(ty, out),
        _ => Err(mismatch(&SqlValue::Timestamp(*t), ty)),
    }
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()))
        .ok()
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) if <bool as ToSql>::accepts(ty) => b.to_sql(ty, out),
            SqlValue::Int(i) => encode_int(*i, ty, out),
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                _ if <String as ToSql>::accepts(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlValue::Text(s) if <String as ToSql>::accepts(ty) => s.to_sql(ty, out),
            // Filter params often arrive as strings from a host form.
            SqlValue::Text(s) if matches!(*ty, Type::TIMESTAMPTZ | Type::TIMESTAMP) => {
                match parse_timestamp(s) {
                    Some(t) => encode_timestamp(&t, ty, out),
                    None => Err(mismatch(self, ty)),
                }
            }
            SqlValue::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => encode_int(i, ty, out),
                Err(_) => Err(mismatch(self, ty)),
            },
            SqlValue::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ if <String as ToSql>::accepts(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlValue::Timestamp(t) => encode_timestamp(t, ty, out),
            _ => Err(mismatch(self, ty)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Decode one driver row into a [`Row`].
///
/// Columns of types without a JSON mapping come back as `null`.
pub(crate) fn decode_row(row: &postgres::Row) -> Row {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_column(row, i, column.type_()));
    }
    map
}

fn decode_column(row: &postgres::Row, i: usize, ty: &Type) -> Value {
    fn get<'a, T>(row: &'a postgres::Row, i: usize) -> Option<T>
    where
        T: postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(i).ok().flatten()
    }

    match *ty {
        Type::BOOL => get::<bool>(row, i).map(Value::from),
        Type::INT2 => get::<i16>(row, i).map(Value::from),
        Type::INT4 => get::<i32>(row, i).map(Value::from),
        Type::INT8 => get::<i64>(row, i).map(Value::from),
        Type::FLOAT4 => get::<f32>(row, i).map(Value::from),
        Type::FLOAT8 => get::<f64>(row, i).map(Value::from),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, i).map(|t| Value::from(t.to_rfc3339())),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, i).map(|t| Value::from(t.to_string())),
        Type::JSON | Type::JSONB => get::<Value>(row, i),
        _ => get::<String>(row, i).map(Value::from),
    }
    .unwrap_or(Value::Null)
}

//! Read helpers through the public API.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tsdb_client::testing::{row, ScriptedConnector};
use tsdb_client::{EventQuery, SqlValue, TimescaleClient};
use tsdb_config::ConnectionConfig;

fn connected(db: &ScriptedConnector) -> TimescaleClient {
    let config = ConnectionConfig::new("h", 5433, "logs", "u", "pw", "site_events").unwrap();
    let mut client = TimescaleClient::with_connector(config, Arc::new(db.clone()));
    client.connect().unwrap();
    client
}

#[test]
fn listing_keeps_column_order() {
    let db = ScriptedConnector::new().respond(
        "FROM \"site_events\"",
        vec![
            row([("id", json!(2)), ("time", json!("2026-01-01T00:00:00+00:00")), ("userid", json!(7))]),
            row([("id", json!(1)), ("time", json!("2025-12-31T23:00:00+00:00")), ("userid", json!(7))]),
        ],
    );
    let mut client = connected(&db);

    let query = EventQuery::new()
        .filter("userid = $1 AND courseid = $2", vec![SqlValue::Int(7), SqlValue::from("3")])
        .limit(2);
    let rows = client.get_events(&query);

    assert_eq!(rows.len(), 2);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, ["id", "time", "userid"]);
    assert_eq!(
        db.statements().last().map(String::as_str),
        Some("SELECT * FROM \"site_events\" WHERE userid = $1 AND courseid = $2 ORDER BY time DESC LIMIT 2 OFFSET 0")
    );
}

#[test]
fn explicit_statistics_window_is_passed_through() {
    let db = ScriptedConnector::new().fail_when(|sql, params| {
        let expected = [
            SqlValue::Timestamp(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            SqlValue::Timestamp(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()),
        ];
        (sql.contains("get_event_statistics") && params != &expected[..])
            .then(|| tsdb_client::DbError::statement("unexpected window"))
    });
    let db = db.respond("get_event_statistics", vec![row([("total_events", json!(3))])]);
    let mut client = connected(&db);

    let stats = client.get_statistics(
        Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()),
    );
    assert_eq!(stats.unwrap()["total_events"], json!(3));
}

#[test]
fn raw_primitives_report_errors() {
    let db = ScriptedConnector::new().fail_statements_containing("DELETE");
    let mut client = connected(&db);
    assert!(client.execute("DELETE FROM \"site_events\" WHERE userid = $1", &[SqlValue::Int(1)]).is_err());
    assert_eq!(client.execute("UPDATE \"site_events\" SET ip = NULL", &[]).unwrap(), 0);
    // A statement error leaves the session usable.
    assert!(client.is_connected());
}

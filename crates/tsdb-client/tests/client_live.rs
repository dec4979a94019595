//! Tests against a real TimescaleDB server.
//!
//! Skipped unless `TSDB_TEST_HOST` is set. The other `TSDB_TEST_*`
//! variables default to a local docker setup. Each test writes to its own
//! throwaway table.

use std::env;

use tsdb_client::{EventQuery, EventRecord, SqlValue, TimescaleClient};
use tsdb_common::schema::create_table_sql;
use tsdb_common::quote_ident;
use tsdb_config::ConnectionConfig;

fn live_config(table: &str) -> Option<ConnectionConfig> {
    let host = env::var("TSDB_TEST_HOST").ok()?;
    let var = |k: &str, default: &str| env::var(k).unwrap_or_else(|_| default.to_string());
    let port = var("TSDB_TEST_PORT", "5433").parse().ok()?;
    ConnectionConfig::new(
        &host,
        port,
        &var("TSDB_TEST_DATABASE", "moodle_logs_tsdb"),
        &var("TSDB_TEST_USERNAME", "moodleuser"),
        &var("TSDB_TEST_PASSWORD", "moodlepass"),
        table,
    )
    .ok()
}

fn fresh_table(table: &str) -> Option<TimescaleClient> {
    let Some(config) = live_config(table) else {
        eprintln!("TSDB_TEST_HOST not set, skipping");
        return None;
    };
    let mut client = TimescaleClient::open(config).expect("live server reachable");
    let quoted = quote_ident(table);
    client
        .execute(&format!("DROP TABLE IF EXISTS {}", quoted), &[])
        .unwrap();
    client.execute(&create_table_sql(&quoted), &[]).unwrap();
    Some(client)
}

#[test]
fn live_count_and_partial_batch() {
    let Some(mut client) = fresh_table("tsdb_live_batch") else {
        return;
    };
    assert!(client.is_connected());
    assert_eq!(client.count_events(None, &[]), 0);

    let mut batch: Vec<EventRecord> = (0..5)
        .map(|i| EventRecord::new(1_700_000_000 + i, "\\core\\event\\course_viewed"))
        .collect();
    assert!(client.write_points(&batch));
    assert_eq!(client.count_events(None, &[]), 5);

    // eventname is NOT NULL: these two rows fail, the rest commit.
    batch[1].eventname = None;
    batch[3].eventname = None;
    let outcome = client.write_batch(&batch).unwrap();
    assert_eq!((outcome.written, outcome.failed), (3, 2));
    assert_eq!(client.count_events(None, &[]), 8);

    let rows = client.get_events(
        &EventQuery::new()
            .filter("time >= to_timestamp($1)", vec![SqlValue::Float(1_700_000_003.0)])
            .order_by("time ASC"),
    );
    assert!(!rows.is_empty());
    assert!(rows[0]["time"].is_string());

    client.execute("DROP TABLE \"tsdb_live_batch\"", &[]).unwrap();
}

#[test]
fn live_versions() {
    let Some(mut client) = fresh_table("tsdb_live_versions") else {
        return;
    };
    let version = client.get_version().unwrap();
    assert!(version.starts_with("PostgreSQL"));
    // Extension may be absent on plain PostgreSQL; either answer is valid.
    let _ = client.get_extension_version();
    client.execute("DROP TABLE \"tsdb_live_versions\"", &[]).unwrap();
}

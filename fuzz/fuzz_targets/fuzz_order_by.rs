//! Fuzz target for ORDER BY sanitization.
//!
//! Whatever the input, the output must be one allow-listed column followed
//! by ASC or DESC.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsdb_client::validate_order_by;

const COLUMNS: [&str; 5] = ["time", "eventname", "component", "userid", "courseid"];

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let clause = validate_order_by(raw);
    let mut parts = clause.split(' ');
    let column = parts.next().unwrap_or_default();
    let direction = parts.next().unwrap_or_default();
    assert!(COLUMNS.contains(&column), "column {:?} escaped", column);
    assert!(direction == "ASC" || direction == "DESC");
    assert!(parts.next().is_none());
});

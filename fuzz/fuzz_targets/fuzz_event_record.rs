//! Fuzz target for event record decoding and parameter mapping.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsdb_client::EventRecord;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = serde_json::from_slice::<EventRecord>(data) {
        // Out-of-range timestamps must surface as errors, never panics
        if let Ok(params) = record.to_params() {
            assert_eq!(params.len(), 20);
        }
    }
});

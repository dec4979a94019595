//! Fuzz target for logstore.toml parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsdb_config::StoreSettings;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(settings) = StoreSettings::from_toml(text) {
        let _ = settings.connection_config();
        let _ = settings.display_rows();
    }
});

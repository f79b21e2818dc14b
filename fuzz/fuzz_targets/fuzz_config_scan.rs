//! Fuzz target for scan.json parsing, validation and grid sizing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppcp_config::{validate_scan, ScanConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ScanConfig>(data) {
        if validate_scan(&config).is_ok() {
            let _ = config.step_count();
        }
    }
});

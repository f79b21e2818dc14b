//! Fuzz target for model.json parsing and validation.
//!
//! Arbitrary bytes must parse or fail cleanly, and anything that parses must
//! validate without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppcp_config::{validate_model, ModelConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ModelConfig>(data) {
        let _ = validate_model(&config);
    }
});

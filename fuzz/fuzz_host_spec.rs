//! Fuzz target for `-H` host spec validation and splitting.
//!
//! Run with: cargo +nightly fuzz run fuzz_host_spec

#![no_main]

use berth_core::endpoint::{split_host, validate_host};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(spec) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(normalized) = validate_host(spec) {
        // A normalized spec always carries a scheme the splitter accepts.
        let endpoint = split_host(&normalized).expect("normalized spec must split");
        assert!(!endpoint.to_string().is_empty());
    }
});

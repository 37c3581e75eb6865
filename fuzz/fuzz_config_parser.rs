//! Fuzz target for `config.toml` parsing and validation.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = berth_config::AppConfig::parse(s);
    }
});

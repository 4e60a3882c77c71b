//! Fuzz target for configuration parsing.
//!
//! Tests that arbitrary configuration text doesn't cause panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use p3270::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Config::builder().text(text).build();
    }
});

//! Fuzz target for reply parsing.
//!
//! Tests that arbitrary emulator output doesn't cause panics when read as
//! replies or status lines.

#![no_main]

use libfuzzer_sys::fuzz_target;
use p3270::{Charset, CommandChannel, ResponseGrammar, StatusMessage};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    for charset in [Charset::Latin1, Charset::Latin2, Charset::Latin5, Charset::Latin9] {
        let mut channel = CommandChannel::new(
            std::io::sink(),
            Cursor::new(data),
            charset,
            ResponseGrammar::default(),
        );
        // Keep reading replies until the input runs out
        while channel.receive().is_ok() {}
    }

    // Status lines on their own
    let text = Charset::Latin1.decode(data);
    for line in text.lines() {
        let _ = StatusMessage::parse(line);
    }
});

//! Fuzz test for the invalidator's stdin command parser
//!
//! Run with: cargo +nightly fuzz run command_fuzz -- -max_total_time=60

#![no_main]

use clipper_invalidation::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        match Command::parse(line) {
            Some(Command::Invalidate { event, extra_keys }) => {
                assert!(!event.is_empty());
                assert!(extra_keys.iter().all(|k| !k.is_empty() && !k.contains(',')));
            }
            Some(Command::Force { keys }) => {
                assert!(keys.iter().all(|k| !k.is_empty() && !k.contains(',')));
            }
            Some(Command::Stats) | Some(Command::Flush) => {}
            None => assert!(line.trim().is_empty() || line.trim_start().starts_with('#')),
        }
    }
});

//! Fuzz test for rule override documents
//!
//! Feeds arbitrary text to the TOML override loader. Loading must either fail
//! with a config error or yield a table that passes validation and covers
//! every registered event.
//!
//! Run with: cargo +nightly fuzz run rules_fuzz -- -max_total_time=60

#![no_main]

use clipper_core::{InvalidationEvent, RuleTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(table) = RuleTable::from_toml_overrides(input) {
            assert!(table.validate().is_ok());
            for event in InvalidationEvent::ALL {
                let rule = table.lookup(event).expect("validated table covers every event");
                assert!(!rule.cache_keys.is_empty());
                if !rule.priority.bypasses_debounce() {
                    assert!(rule.max_delay >= rule.debounce_window);
                }
            }
        }

        // Event names round-trip through their canonical form.
        if let Ok(event) = input.parse::<InvalidationEvent>() {
            assert_eq!(event.as_str(), input);
        }
    }
});

#![no_main]

//! Fuzz target for artifact JSON parsing.
//!
//! Covers the report, session and validation records read back from disk.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = serde_json::from_str::<govfix_types::report::GovernanceReport>(s);
    let _ = serde_json::from_str::<govfix_types::session::SessionRecord>(s);
    let _ = serde_json::from_str::<govfix_types::validation::ValidationReport>(s);

    // Anything that parses as a selector renders to something that parses again.
    if let Some(sel) = govfix_types::session::Selector::parse(s) {
        assert!(govfix_types::session::Selector::parse(&sel.to_string()).is_some());
    }
});

#![no_main]

//! Fuzz target for the deterministic fix strategies.
//!
//! A rewrite must terminate and, when it reports an edit, actually change the content.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };

    for strategy in govfix_domain::builtin_strategies() {
        if let Some(edit) = strategy.rewrite(content, &[]) {
            assert_ne!(edit.content, content, "{} reported a no-op edit", strategy.key());
        }
    }
});

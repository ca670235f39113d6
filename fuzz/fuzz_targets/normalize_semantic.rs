#![no_main]

//! Fuzz target for model reply parsing.
//!
//! Replies are free text with a JSON array somewhere inside.

use camino::Utf8Path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = govfix_engines::normalize::semantic::first_json_array(s);
    let _ = govfix_engines::normalize::semantic::normalize(s, Utf8Path::new("openapi.yaml"));
    let _ = govfix_engines::strip_code_fences(s);
});

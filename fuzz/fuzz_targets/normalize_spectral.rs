#![no_main]

//! Fuzz target for spectral JSON normalization.
//!
//! Arbitrary stdout must come back as violations or a parse error, never a panic.

use camino::Utf8Path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(violations) = govfix_engines::normalize::spectral::normalize(
        s,
        Utf8Path::new("/project"),
        Utf8Path::new("openapi.yaml"),
    ) {
        for v in &violations {
            assert!(!v.file.is_empty(), "violation without a file");
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use yieldlens::ingest::parse_csv;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed rows must surface as IngestError, never a panic
        let _ = parse_csv(input);
    }
});

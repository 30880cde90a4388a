#![no_main]
use libfuzzer_sys::fuzz_target;
use parsers::{parse_source, Language};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(tree) = parse_source(Language::Generic, "fuzz.gen", s) {
            assert!(ir::schema::validate(&tree, false).is_ok());
        }
    }
});

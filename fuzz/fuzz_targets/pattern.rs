#![no_main]
use libfuzzer_sys::fuzz_target;
use parsers::Language;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(pattern) = patterns::compile_pattern(Language::Generic, s) {
            assert!(ir::schema::validate(&pattern.tree, true).is_ok());
        }
    }
});

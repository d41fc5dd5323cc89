#![no_main]

use libfuzzer_sys::fuzz_target;
use protogen_compiler::{analyzer, ast, backends, parser};

fuzz_target!(|source: String| {
    let mut sources = ast::SourceDatabase::new();
    let Ok(protocol) = parser::parse_inline(&mut sources, "input.json", source) else {
        return;
    };
    if analyzer::analyze(&protocol).is_err() {
        return;
    }
    let _ = backends::rust::generate(&protocol);
});

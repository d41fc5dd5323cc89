#![no_main]

use libfuzzer_sys::fuzz_target;
use protogen_compiler::{ast, backends, parser};

fuzz_target!(|source: String| {
    let mut sources = ast::SourceDatabase::new();
    let Ok(protocol) = parser::parse_inline(&mut sources, "input.json", source) else {
        return;
    };
    let _ = backends::json::generate(&protocol);
});

// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files;

use crate::ast;

/// Convert a one-based line and column as reported by serde_json
/// into a byte offset into `source`.
fn byte_offset(line_starts: &[usize], source: &str, line: usize, column: usize) -> usize {
    let Some(start) = line.checked_sub(1).and_then(|line| line_starts.get(line)) else {
        return source.len();
    };
    std::cmp::min(start + column.saturating_sub(1), source.len())
}

/// Parse a protocol IR from a JSON string.
///
/// The file is added to the compilation database under the provided
/// name.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<ast::Protocol, Diagnostic<ast::FileId>> {
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let result = serde_json::from_str::<ast::Protocol>(&source);
    let file = sources.add(name.to_owned(), source);
    result.map_err(|err| {
        let source = sources.get(file).map(|f| f.source().as_str()).unwrap_or_default();
        let offset = byte_offset(&line_starts, source, err.line(), err.column());
        Diagnostic::error()
            .with_message(format!("failed to parse input file '{}'", name))
            .with_labels(vec![Label::primary(file, offset..offset).with_message(err.to_string())])
    })
}

/// Parse a new source file.
///
/// The source file is fully read and added to the compilation
/// database. Returns the protocol IR, or a descriptive error
/// message in case of syntax error.
pub fn parse_file(
    sources: &mut ast::SourceDatabase,
    name: &str,
) -> Result<ast::Protocol, Diagnostic<ast::FileId>> {
    let source = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    parse_inline(sources, name, source)
}

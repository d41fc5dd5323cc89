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

//! Rust compiler backend.

use crate::{analyzer, ast};
use heck::{ToSnakeCase, ToUpperCamelCase};
use quote::{format_ident, quote};

mod declarations;
mod decoder;
mod preamble;
mod types;

use declarations::Declarations;
use decoder::Decoders;

pub trait ToIdent {
    /// Generate a sanitized rust identifier.
    /// Rust specific keywords are renamed for validity.
    fn to_ident(self) -> proc_macro2::Ident;
}

impl ToIdent for &'_ str {
    fn to_ident(self) -> proc_macro2::Ident {
        match self {
            // These keywords cannot be used as raw identifiers.
            "crate" | "self" | "Self" | "super" => format_ident!("{}_", self),
            "as" | "break" | "const" | "continue" | "else" | "enum" | "extern" | "false" | "fn"
            | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut"
            | "pub" | "ref" | "return" | "static" | "struct" | "trait" | "true" | "type"
            | "unsafe" | "use" | "where" | "while" | "async" | "await" | "dyn" | "abstract"
            | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
            | "unsized" | "virtual" | "yield" | "try" => format_ident!("r#{}", self),
            "" | "_" => format_ident!("unnamed"),
            _ if self.starts_with(|c: char| c.is_ascii_digit()) => format_ident!("_{}", self),
            _ => format_ident!("{}", self),
        }
    }
}

/// Identifiers the generated code imports from the runtime or uses
/// from the prelude. Generated types and functions cannot take them.
const RESERVED_IDENTS: [&str; 8] =
    ["BitCursor", "DecodeError", "read_array", "read_vec", "Result", "Ok", "Err", "Vec"];

/// Return true if the generated identifier `ident` would shadow a name
/// the generated code depends on.
pub fn is_reserved(ident: &proc_macro2::Ident) -> bool {
    RESERVED_IDENTS.iter().any(|reserved| ident == reserved)
}

/// Replace the characters that cannot appear in an identifier.
fn sanitize(id: String) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Identifier of the type generated for the protocol type `id`.
pub fn type_ident(id: &str) -> proc_macro2::Ident {
    sanitize(id.to_upper_camel_case()).as_str().to_ident()
}

/// Identifier of the struct member generated for the field `id`.
pub fn field_ident(id: &str) -> proc_macro2::Ident {
    sanitize(id.to_snake_case()).as_str().to_ident()
}

/// Identifier of the function `<prefix>_<id>` generated for the
/// protocol type `id`.
pub fn fn_ident(prefix: &str, id: &str) -> proc_macro2::Ident {
    format_ident!("{}_{}", prefix, sanitize(id.to_snake_case()))
}

/// Generate Rust code from a protocol.
///
/// The output contains the preamble, the type declarations in
/// dependency order, then the decoders of all declared structs.
pub fn generate_tokens(
    protocol: &ast::Protocol,
) -> Result<proc_macro2::TokenStream, analyzer::Error> {
    let scope = analyzer::Scope::new(protocol)?;

    let mut declarations = Declarations::new(&scope);
    for def in &protocol.types {
        declarations.declare(def)?;
    }

    let mut decoders = Decoders::new(&scope);
    for def in declarations.declared() {
        decoders.generate(def)?;
    }

    log::info!(
        "generated {} declarations for protocol `{}`",
        declarations.declared().len(),
        protocol.name
    );
    let preamble = preamble::generate(&protocol.name);
    Ok(quote! {
        #preamble
        #declarations
        #decoders
    })
}

/// Generate formatted Rust code from a protocol.
pub fn generate(protocol: &ast::Protocol) -> Result<String, analyzer::Error> {
    let syntax_tree =
        syn::parse2(generate_tokens(protocol)?).expect("generated code could not be parsed");
    Ok(prettyplease::unparse(&syntax_tree))
}

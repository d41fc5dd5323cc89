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

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::term;
use proc_macro2::TokenStream;
use protogen_compiler::ast;
use quote::quote;
use std::env;
use std::path::Path;
use syn::parse_macro_input;

/// Render a diagnostic as a compile error attached to `span`.
fn diagnostic_error(
    span: proc_macro2::Span,
    sources: &ast::SourceDatabase,
    diagnostic: &Diagnostic<ast::FileId>,
) -> TokenStream {
    let mut buffer = termcolor::Buffer::no_color();
    let message = match term::emit(&mut buffer, &term::Config::default(), sources, diagnostic) {
        Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
        Err(_) => diagnostic.message.clone(),
    };
    syn::Error::new(span, message).to_compile_error()
}

/// Analyze the protocol and expand the generated code inside the
/// annotated module. `dependency` is the path of the protocol file,
/// if any.
fn expand_module(
    span: proc_macro2::Span,
    sources: &ast::SourceDatabase,
    protocol: ast::Protocol,
    dependency: Option<String>,
    input: syn::ItemMod,
) -> TokenStream {
    // Run the analyzer.
    if let Err(err) = protogen_compiler::analyzer::analyze(&protocol) {
        return diagnostic_error(span, sources, &err.to_diagnostic());
    }

    // Generate the declarations and decoders.
    let generated = match protogen_compiler::backends::rust::generate_tokens(&protocol) {
        Ok(generated) => generated,
        Err(err) => return diagnostic_error(span, sources, &err.to_diagnostic()),
    };
    let mod_ident = input.ident;
    let mod_attrs = input.attrs;
    let mod_vis = input.vis;
    let mod_items = input.content.map(|(_, items)| items).unwrap_or_default();

    // Generate an include_bytes! statement to force a dependency
    // on the source protocol file.
    // This workaround is also used by pest, see
    // pest_generator::generator::generate_include, and for context
    // https://internals.rust-lang.org/t/pre-rfc-add-a-builtin-macro-to-indicate-build-dependency-to-file/9242.
    let dependency = dependency.map(|path| quote!(const _: &[u8] = include_bytes!(#path);));

    quote! {
        #(#mod_attrs)*
        #mod_vis mod #mod_ident {
            #dependency
            #generated
            #(#mod_items)*
        }
    }
}

fn protogen_proc_macro(path: syn::LitStr, input: syn::ItemMod) -> TokenStream {
    // Locate the source protocol file.
    let root = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into());
    let Some(relative_path) =
        [Path::new(&root).join(path.value()), Path::new(&root).join("src").join(path.value())]
            .into_iter()
            .find(|path| path.exists())
    else {
        return syn::Error::new(path.span(), "error: unable to find file").to_compile_error();
    };

    // Load and parse the protocol.
    let mut sources = ast::SourceDatabase::new();
    let relative_path = relative_path.to_string_lossy().into_owned();
    let protocol = match protogen_compiler::parser::parse_file(&mut sources, &relative_path) {
        Ok(protocol) => protocol,
        Err(err) => return diagnostic_error(path.span(), &sources, &err),
    };

    expand_module(path.span(), &sources, protocol, Some(relative_path), input)
}

fn protogen_inline_proc_macro(source: syn::LitStr, input: syn::ItemMod) -> TokenStream {
    let mut sources = ast::SourceDatabase::new();
    let protocol =
        match protogen_compiler::parser::parse_inline(&mut sources, "inline", source.value()) {
            Ok(protocol) => protocol,
            Err(err) => return diagnostic_error(source.span(), &sources, &err),
        };

    expand_module(source.span(), &sources, protocol, None, input)
}

/// Expand the declarations and decoders generated from a JSON
/// protocol file inside the annotated module.
///
/// The path is relative to the crate root, or to its `src/`
/// directory.
#[proc_macro_attribute]
pub fn protogen(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr as syn::LitStr);
    let input = parse_macro_input!(input as syn::ItemMod);
    protogen_proc_macro(attr, input).into()
}

/// Expand the declarations and decoders generated from an inline JSON
/// protocol inside the annotated module.
#[proc_macro_attribute]
pub fn protogen_inline(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr as syn::LitStr);
    let input = parse_macro_input!(input as syn::ItemMod);
    protogen_inline_proc_macro(attr, input).into()
}

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

//! Generate the decoders.
//!
//! Each struct receives a composing parser `parse_<struct>` chaining the
//! decoders of its fields over a shared cursor, and an entry point
//! `decode_<struct>` taking the raw input bytes. Bitstring fields are
//! read with `read_<bitstring>` functions generated once per run.

use crate::analyzer::{Error, Scope};
use crate::ast::ProtocolType;
use crate::backends::rust::declarations::member_type;
use crate::backends::rust::{field_ident, fn_ident, is_reserved, type_ident, types};
use quote::{format_ident, quote};
use std::collections::{HashMap, HashSet};

/// Allocate the names of the intermediate bindings of a composing
/// parser. The supply of names is unbounded.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    next: usize,
}

impl SymbolAllocator {
    pub fn allocate(&mut self) -> proc_macro2::Ident {
        let id = format_ident!("v{}", self.next);
        self.next += 1;
        id
    }
}

pub struct Decoders<'a, 'd> {
    scope: &'a Scope<'d>,
    /// Bitstrings with a generated reader.
    readers: HashSet<&'d str>,
    /// Generated function names, mapped to the type they were
    /// generated for.
    fn_names: HashMap<String, &'d str>,
    code: Vec<proc_macro2::TokenStream>,
}

impl<'a, 'd> Decoders<'a, 'd> {
    pub fn new(scope: &'a Scope<'d>) -> Decoders<'a, 'd> {
        Decoders { scope, readers: HashSet::new(), fn_names: HashMap::new(), code: vec![] }
    }

    /// Generate the decoders for a declared type.
    /// Only structs receive a composing parser and an entry point.
    pub fn generate(&mut self, def: &'d ProtocolType) -> Result<(), Error> {
        let ProtocolType::Struct { fields, .. } = def else {
            return Ok(());
        };

        let mut statements = vec![];
        let mut members = vec![];
        let mut symbols = SymbolAllocator::default();
        let mut unbounded_field: Option<&str> = None;
        for field in fields {
            // A growable array consumes the remaining input, no field
            // can be decoded after it.
            if let Some(field_id) = unbounded_field {
                return Err(Error::UnsupportedFieldKind {
                    type_id: def.id().to_owned(),
                    field_id: field_id.to_owned(),
                    kind: "growable array",
                });
            }
            let field_def = self.scope.resolve(def, &field.field_type)?;
            if self.is_unbounded(field_def)? {
                unbounded_field = Some(&field.field_name);
            }
            let field_type = member_type(self.scope, def.id(), &field.field_name, field_def)?;
            let call = self.field_call(def.id(), &field.field_name, field_def)?;
            let symbol = symbols.allocate();
            let field_id = field_ident(&field.field_name);
            statements.push(quote! {
                let #symbol: #field_type = #call?;
            });
            members.push(quote!(#field_id: #symbol));
        }

        let name = type_ident(def.id());
        let parse_fn = self.declare_fn("parse", def)?;
        let decode_fn = self.declare_fn("decode", def)?;
        log::debug!("generated decoder `{}`", decode_fn);
        self.code.push(quote! {
            pub fn #parse_fn(cursor: &mut BitCursor<'_>) -> Result<#name, DecodeError> {
                #(#statements)*
                Ok(#name { #(#members),* })
            }

            pub fn #decode_fn(buf: &[u8]) -> Result<(#name, &[u8]), DecodeError> {
                let mut cursor = BitCursor::new(buf);
                let packet = #parse_fn(&mut cursor)?;
                Ok((packet, cursor.remainder()))
            }
        });
        Ok(())
    }

    /// Return the name of the function `<prefix>_<type>`, checking that
    /// it was not already generated for a different type.
    fn declare_fn(
        &mut self,
        prefix: &str,
        def: &'d ProtocolType,
    ) -> Result<proc_macro2::Ident, Error> {
        let id = fn_ident(prefix, def.id());
        if is_reserved(&id) {
            return Err(Error::NameCollision { type_id: def.id().to_owned() });
        }
        match self.fn_names.get(&id.to_string()) {
            Some(prev) if *prev != def.id() => {
                Err(Error::NameCollision { type_id: def.id().to_owned() })
            }
            _ => {
                self.fn_names.insert(id.to_string(), def.id());
                Ok(id)
            }
        }
    }

    /// Return true if decoding a value of type `def` consumes the input
    /// until exhausted.
    fn is_unbounded(&self, def: &'d ProtocolType) -> Result<bool, Error> {
        match def {
            ProtocolType::Array { length: None, .. } => Ok(true),
            ProtocolType::Array { element_type, length: Some(_), .. } => {
                self.is_unbounded(self.scope.resolve(def, element_type)?)
            }
            ProtocolType::Struct { fields, .. } => match fields.last() {
                Some(field) => self.is_unbounded(self.scope.resolve(def, &field.field_type)?),
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }

    /// Generate the reader for the bitstring `def` of `size` bits,
    /// unless already generated.
    fn reader(&mut self, def: &'d ProtocolType, size: i64) -> Result<proc_macro2::Ident, Error> {
        let id = def.id();
        let read_fn = self.declare_fn("read", def)?;
        if self.readers.insert(id) {
            let backing_type = types::resolve_width(id, size)?;
            let name = type_ident(id);
            let cursor = format_ident!("cursor");
            // The size is positive once the width is resolved.
            let value = types::read_uint(id, size as usize, backing_type, &cursor);
            log::debug!("generated reader `{}`", read_fn);
            self.code.push(quote! {
                pub fn #read_fn(cursor: &mut BitCursor<'_>) -> Result<#name, DecodeError> {
                    Ok(#name(#value))
                }
            });
        }
        Ok(read_fn)
    }

    /// Generate the expression decoding a value of type `def` from
    /// `cursor`.
    fn field_call(
        &mut self,
        parent: &str,
        field_id: &str,
        def: &'d ProtocolType,
    ) -> Result<proc_macro2::TokenStream, Error> {
        match def {
            ProtocolType::Array { element_type, length, .. } => {
                let element_def = self.scope.resolve(def, element_type)?;
                let element = self.field_decoder(parent, field_id, element_def)?;
                Ok(match length {
                    Some(_) => quote!(read_array(cursor, #element)),
                    None => quote!(read_vec(cursor, #element)),
                })
            }
            _ => {
                let decoder = self.field_decoder(parent, field_id, def)?;
                Ok(quote!(#decoder(cursor)))
            }
        }
    }

    /// Generate the expression of a function decoding a value of type
    /// `def` from a cursor. The expression is either a function path or
    /// a closure.
    fn field_decoder(
        &mut self,
        parent: &str,
        field_id: &str,
        def: &'d ProtocolType,
    ) -> Result<proc_macro2::TokenStream, Error> {
        match def {
            ProtocolType::BitString { size, .. } => {
                let read_fn = self.reader(def, *size)?;
                Ok(quote!(#read_fn))
            }
            ProtocolType::Struct { .. } => {
                let parse_fn = fn_ident("parse", def.id());
                Ok(quote!(#parse_fn))
            }
            ProtocolType::Array { .. } => {
                let call = self.field_call(parent, field_id, def)?;
                Ok(quote!(|cursor| #call))
            }
            ProtocolType::Enum { .. }
            | ProtocolType::Function { .. }
            | ProtocolType::Context { .. } => Err(Error::UnsupportedFieldKind {
                type_id: parent.to_owned(),
                field_id: field_id.to_owned(),
                kind: def.kind(),
            }),
        }
    }
}

impl quote::ToTokens for Decoders<'_, '_> {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let code = &self.code;
        tokens.extend(quote! {
            #(#code)*
        });
    }
}

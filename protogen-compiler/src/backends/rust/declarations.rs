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

//! Generate the type declarations.
//!
//! Types are declared depth first following the "declared before"
//! relation: a type is emitted after all the types it references.

use crate::analyzer::{Error, Scope};
use crate::ast::{ProtocolType, Trait};
use crate::backends::rust::{field_ident, is_reserved, type_ident, types};
use quote::quote;
use std::collections::HashMap;

/// Declaration state of a type name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mark {
    NotStarted,
    InProgress,
    Done,
}

/// Track the declaration state of type names for one generation run.
#[derive(Debug, Default)]
pub struct Registry<'d> {
    marks: HashMap<&'d str, Mark>,
}

impl<'d> Registry<'d> {
    pub fn mark(&self, id: &str) -> Mark {
        self.marks.get(id).copied().unwrap_or(Mark::NotStarted)
    }

    fn start(&mut self, id: &'d str) {
        self.marks.insert(id, Mark::InProgress);
    }

    fn finish(&mut self, id: &'d str) {
        self.marks.insert(id, Mark::Done);
    }
}

/// Derived capability of a generated type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    Printable,
    Equality,
    Ordinal,
}

/// Map requested traits to the derived capabilities, in derive order.
///
/// `Printable` is always present. A total order is also an
/// equivalence, `Ordinal` brings `Equality` with it.
pub fn capabilities(traits: &[Trait]) -> Vec<Capability> {
    let ordinal = traits.contains(&Trait::Ordinal);
    let equality = ordinal || traits.contains(&Trait::Equality);
    let mut capabilities = vec![Capability::Printable];
    if equality {
        capabilities.push(Capability::Equality);
    }
    if ordinal {
        capabilities.push(Capability::Ordinal);
    }
    capabilities
}

impl quote::ToTokens for Capability {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        tokens.extend(match self {
            Capability::Printable => quote!(Debug),
            Capability::Equality => quote!(PartialEq, Eq),
            Capability::Ordinal => quote!(PartialOrd, Ord),
        })
    }
}

/// Bitstring wrappers provide all capabilities, so that any struct or
/// enum holding them can derive what it requests.
const WRAPPER_CAPABILITIES: [Capability; 3] =
    [Capability::Printable, Capability::Equality, Capability::Ordinal];

fn derive_attribute(capabilities: &[Capability]) -> proc_macro2::TokenStream {
    quote! {
        #[derive(#(#capabilities),*)]
    }
}

/// Return the list of types that must be declared before `def`,
/// in the order they are referenced.
pub fn dependencies<'d>(
    scope: &Scope<'d>,
    def: &'d ProtocolType,
) -> Result<Vec<&'d ProtocolType>, Error> {
    let mut deps = vec![];
    match def {
        ProtocolType::Struct { fields, .. } => {
            for field in fields {
                deps.push(scope.resolve(def, &field.field_type)?);
            }
        }
        ProtocolType::Enum { variants, .. } => {
            for variant in variants {
                let variant_def = scope.resolve(def, variant)?;
                match variant_def {
                    // The fields of a struct variant are attached to the
                    // variant, the struct itself is not declared.
                    ProtocolType::Struct { fields, .. } => {
                        for field in fields {
                            deps.push(scope.resolve(variant_def, &field.field_type)?);
                        }
                    }
                    _ => deps.push(variant_def),
                }
            }
        }
        ProtocolType::Array { element_type, .. } => deps.push(scope.resolve(def, element_type)?),
        ProtocolType::BitString { .. }
        | ProtocolType::Function { .. }
        | ProtocolType::Context { .. } => (),
    }
    Ok(deps)
}

/// Generate the type expression used for a member of type `def`.
///
/// Bitstrings, structs and enums are referenced by name, arrays are
/// expanded inline. `parent` and `field_id` identify the member in
/// reported errors.
pub fn member_type<'d>(
    scope: &Scope<'d>,
    parent: &str,
    field_id: &str,
    def: &'d ProtocolType,
) -> Result<proc_macro2::TokenStream, Error> {
    match def {
        ProtocolType::BitString { name, .. }
        | ProtocolType::Struct { name, .. }
        | ProtocolType::Enum { name, .. } => {
            let id = type_ident(name);
            Ok(quote!(#id))
        }
        ProtocolType::Array { element_type, length, .. } => {
            let element_def = scope.resolve(def, element_type)?;
            let element_type = member_type(scope, parent, field_id, element_def)?;
            Ok(match length {
                Some(length) => {
                    let length = proc_macro2::Literal::usize_unsuffixed(*length);
                    quote!([#element_type; #length])
                }
                None => quote!(Vec<#element_type>),
            })
        }
        ProtocolType::Function { .. } | ProtocolType::Context { .. } => {
            Err(Error::UnsupportedFieldKind {
                type_id: parent.to_owned(),
                field_id: field_id.to_owned(),
                kind: def.kind(),
            })
        }
    }
}

/// Return the capabilities available on values of type `def`.
fn provided_capabilities<'d>(scope: &Scope<'d>, def: &'d ProtocolType) -> Vec<Capability> {
    match def {
        ProtocolType::BitString { .. } => WRAPPER_CAPABILITIES.to_vec(),
        ProtocolType::Struct { traits, .. } | ProtocolType::Enum { traits, .. } => {
            capabilities(traits)
        }
        ProtocolType::Array { element_type, .. } => match scope.resolve(def, element_type) {
            Ok(element_def) => provided_capabilities(scope, element_def),
            Err(_) => vec![],
        },
        ProtocolType::Function { .. } | ProtocolType::Context { .. } => vec![],
    }
}

pub struct Declarations<'a, 'd> {
    scope: &'a Scope<'d>,
    registry: Registry<'d>,
    /// Generated identifiers, mapped to the type they were generated for.
    idents: HashMap<String, &'d str>,
    declared: Vec<&'d ProtocolType>,
    code: Vec<proc_macro2::TokenStream>,
}

impl<'a, 'd> Declarations<'a, 'd> {
    pub fn new(scope: &'a Scope<'d>) -> Declarations<'a, 'd> {
        Declarations {
            scope,
            registry: Registry::default(),
            idents: HashMap::new(),
            declared: vec![],
            code: vec![],
        }
    }

    /// Types declared so far, in declaration order.
    pub fn declared(&self) -> &[&'d ProtocolType] {
        &self.declared
    }

    /// Declare `def` after all the types it depends on.
    /// Declaring an already declared type has no effect.
    pub fn declare(&mut self, def: &'d ProtocolType) -> Result<(), Error> {
        let id = def.id();
        match self.registry.mark(id) {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(Error::CycleDetected { type_id: id.to_owned() }),
            Mark::NotStarted => (),
        }

        // Functions and contexts are opaque to code generation.
        if matches!(def, ProtocolType::Function { .. } | ProtocolType::Context { .. }) {
            return Ok(());
        }

        self.registry.start(id);
        for dep in dependencies(self.scope, def)? {
            self.declare(dep)?;
        }

        self.check_ident(def)?;
        self.check_capabilities(def);
        let code = self.generate_decl(def)?;
        log::debug!("declared {} `{}`", def.kind(), id);
        self.code.push(code);
        self.declared.push(def);
        self.registry.finish(id);
        Ok(())
    }

    /// Check that no other type maps to the same Rust identifier, and
    /// that the identifier is not reserved.
    fn check_ident(&mut self, def: &'d ProtocolType) -> Result<(), Error> {
        let ident = type_ident(def.id());
        if is_reserved(&ident) {
            return Err(Error::NameCollision { type_id: def.id().to_owned() });
        }
        let ident = ident.to_string();
        match self.idents.get(&ident) {
            Some(prev) if *prev != def.id() => {
                Err(Error::NameCollision { type_id: def.id().to_owned() })
            }
            _ => {
                self.idents.insert(ident, def.id());
                Ok(())
            }
        }
    }

    /// Return the member types of `def` missing one of the capabilities
    /// `def` derives, with the first missing capability.
    fn unsatisfied_capabilities(&self, def: &'d ProtocolType) -> Vec<(&'d str, Capability)> {
        let required = capabilities(def.traits());
        let Ok(deps) = dependencies(self.scope, def) else {
            return vec![];
        };
        deps.into_iter()
            // Unit variants carry no payload.
            .filter(|dep| {
                !matches!(dep, ProtocolType::Function { .. } | ProtocolType::Context { .. })
            })
            .filter_map(|dep| {
                let provided = provided_capabilities(self.scope, dep);
                required.iter().find(|c| !provided.contains(*c)).map(|c| (dep.id(), *c))
            })
            .collect()
    }

    /// Warn about derives that cannot be satisfied by the member types.
    fn check_capabilities(&self, def: &'d ProtocolType) {
        for (dep, missing) in self.unsatisfied_capabilities(def) {
            log::warn!(
                "{} `{}` requires {:?} but member type `{}` does not provide it",
                def.kind(),
                def.id(),
                missing,
                dep
            );
        }
    }

    fn generate_decl(&self, def: &'d ProtocolType) -> Result<proc_macro2::TokenStream, Error> {
        let name = type_ident(def.id());
        match def {
            ProtocolType::BitString { name: id, size } => {
                let backing_type = types::resolve_width(id, *size)?;
                let derive = derive_attribute(&WRAPPER_CAPABILITIES);
                Ok(quote! {
                    #derive
                    pub struct #name(pub #backing_type);
                })
            }
            ProtocolType::Struct { name: id, fields, traits } => {
                let derive = derive_attribute(&capabilities(traits));
                let mut members = vec![];
                for field in fields {
                    let field_def = self.scope.resolve(def, &field.field_type)?;
                    let field_type = member_type(self.scope, id, &field.field_name, field_def)?;
                    let field_id = field_ident(&field.field_name);
                    members.push(quote!(pub #field_id: #field_type));
                }
                Ok(quote! {
                    #derive
                    pub struct #name {
                        #(#members,)*
                    }
                })
            }
            ProtocolType::Enum { variants, traits, .. } => {
                let derive = derive_attribute(&capabilities(traits));
                let mut cases = vec![];
                for variant in variants {
                    let variant_def = self.scope.resolve(def, variant)?;
                    cases.push(self.generate_variant(variant_def)?);
                }
                Ok(quote! {
                    #derive
                    pub enum #name {
                        #(#cases,)*
                    }
                })
            }
            ProtocolType::Array { name: id, .. } => {
                let array_type = member_type(self.scope, id, id, def)?;
                Ok(quote! {
                    pub type #name = #array_type;
                })
            }
            ProtocolType::Function { .. } | ProtocolType::Context { .. } => Ok(quote!()),
        }
    }

    fn generate_variant(&self, def: &'d ProtocolType) -> Result<proc_macro2::TokenStream, Error> {
        let name = type_ident(def.id());
        match def {
            ProtocolType::BitString { .. } | ProtocolType::Enum { .. } => Ok(quote!(#name(#name))),
            ProtocolType::Array { name: id, .. } => {
                let array_type = member_type(self.scope, id, id, def)?;
                Ok(quote!(#name(#array_type)))
            }
            ProtocolType::Struct { name: id, fields, .. } => {
                let mut members = vec![];
                for field in fields {
                    let field_def = self.scope.resolve(def, &field.field_type)?;
                    let field_type = member_type(self.scope, id, &field.field_name, field_def)?;
                    let field_id = field_ident(&field.field_name);
                    members.push(quote!(#field_id: #field_type));
                }
                Ok(quote!(#name { #(#members,)* }))
            }
            ProtocolType::Function { .. } | ProtocolType::Context { .. } => Ok(quote!(#name)),
        }
    }
}

impl quote::ToTokens for Declarations<'_, '_> {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let code = &self.code;
        tokens.extend(quote! {
            #(#code)*
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::parser::parse_inline;
    use crate::test_utils::assert_tokens_eq;
    use quote::ToTokens;

    fn parse(text: &str) -> ast::Protocol {
        let mut db = ast::SourceDatabase::new();
        parse_inline(&mut db, "test", text.to_owned()).expect("parsing failure")
    }

    fn declare_all(protocol: &ast::Protocol) -> Result<proc_macro2::TokenStream, Error> {
        let scope = Scope::new(protocol)?;
        let mut declarations = Declarations::new(&scope);
        for def in &protocol.types {
            declarations.declare(def)?;
        }
        Ok(declarations.into_token_stream())
    }

    const HEADER: &str = r#"
        { "name": "Test", "types": [
            { "kind": "Struct", "name": "Header", "fields": [
                { "field_name": "version",
                  "field_type": { "kind": "BitString", "name": "Version", "size": 4 } },
                { "field_name": "flags",
                  "field_type": { "kind": "BitString", "name": "Flags", "size": 12 } }
            ] }
        ] }
    "#;

    #[test]
    fn test_capabilities() {
        use Capability::*;
        assert_eq!(capabilities(&[]), vec![Printable]);
        assert_eq!(capabilities(&[Trait::Equality]), vec![Printable, Equality]);
        assert_eq!(capabilities(&[Trait::Ordinal, Trait::Equality]), vec![
            Printable, Equality, Ordinal
        ]);
        assert_eq!(capabilities(&[Trait::Ordinal]), vec![Printable, Equality, Ordinal]);
        assert_eq!(capabilities(&[Trait::Equality, Trait::Equality]), vec![Printable, Equality]);
    }

    #[test]
    fn test_struct_declaration() {
        let protocol = parse(HEADER);
        assert_tokens_eq(
            declare_all(&protocol).unwrap(),
            quote! {
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Version(pub u8);
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Flags(pub u16);
                #[derive(Debug)]
                pub struct Header {
                    pub version: Version,
                    pub flags: Flags,
                }
            },
        );
    }

    #[test]
    fn test_declare_is_idempotent() {
        let protocol = parse(HEADER);
        let scope = Scope::new(&protocol).unwrap();
        let header = &protocol.types[0];

        let mut once = Declarations::new(&scope);
        once.declare(header).unwrap();
        let mut twice = Declarations::new(&scope);
        twice.declare(header).unwrap();
        twice.declare(header).unwrap();

        assert_eq!(once.declared().len(), 3);
        assert_eq!(twice.declared().len(), 3);
        assert_eq!(
            once.into_token_stream().to_string(),
            twice.into_token_stream().to_string()
        );
    }

    #[test]
    fn test_struct_derives() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Ordered", "traits": ["Equality", "Ordinal"],
                  "fields": [] },
                { "kind": "Enum", "name": "Compared", "traits": ["Equality"], "variants": [] }
            ] }
            "#,
        );
        assert_tokens_eq(
            declare_all(&protocol).unwrap(),
            quote! {
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Ordered {}
                #[derive(Debug, PartialEq, Eq)]
                pub enum Compared {}
            },
        );
    }

    #[test]
    fn test_array_declarations() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Array", "name": "Octets",
                  "element_type": { "kind": "BitString", "name": "Octet", "size": 8 } },
                { "kind": "Array", "name": "Quad", "element_type": "Octet", "length": 4 },
                { "kind": "Struct", "name": "Frame", "fields": [
                    { "field_name": "data", "field_type": "Octets" },
                    { "field_name": "grid", "field_type":
                        { "kind": "Array", "name": "Grid", "element_type": "Quad", "length": 2 } }
                ] }
            ] }
            "#,
        );
        assert_tokens_eq(
            declare_all(&protocol).unwrap(),
            quote! {
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Octet(pub u8);
                pub type Octets = Vec<Octet>;
                pub type Quad = [Octet; 4];
                pub type Grid = [[Octet; 4]; 2];
                #[derive(Debug)]
                pub struct Frame {
                    pub data: Vec<Octet>,
                    pub grid: [[Octet; 4]; 2],
                }
            },
        );
    }

    #[test]
    fn test_enum_declaration() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Enum", "name": "Message", "variants": [
                    { "kind": "BitString", "name": "Code", "size": 3 },
                    { "kind": "Array", "name": "Data",
                      "element_type": { "kind": "BitString", "name": "Octet", "size": 8 } },
                    { "kind": "Struct", "name": "Ack", "fields": [
                        { "field_name": "seq",
                          "field_type": { "kind": "BitString", "name": "Seq", "size": 32 } }
                    ] },
                    { "kind": "Function", "name": "Reset" }
                ] }
            ] }
            "#,
        );
        assert_tokens_eq(
            declare_all(&protocol).unwrap(),
            quote! {
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Code(pub u8);
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Octet(pub u8);
                pub type Data = Vec<Octet>;
                #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
                pub struct Seq(pub u32);
                #[derive(Debug)]
                pub enum Message {
                    Code(Code),
                    Data(Vec<Octet>),
                    Ack { seq: Seq },
                    Reset,
                }
            },
        );
    }

    #[test]
    fn test_dependency_order() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Outer", "fields": [
                    { "field_name": "inner", "field_type": "Inner" },
                    { "field_name": "tail",
                      "field_type": { "kind": "BitString", "name": "Tail", "size": 1 } }
                ] },
                { "kind": "Struct", "name": "Inner", "fields": [
                    { "field_name": "head",
                      "field_type": { "kind": "BitString", "name": "Head", "size": 1 } }
                ] }
            ] }
            "#,
        );
        let scope = Scope::new(&protocol).unwrap();
        let mut declarations = Declarations::new(&scope);
        for def in &protocol.types {
            declarations.declare(def).unwrap();
        }
        let order = declarations.declared().iter().map(|def| def.id()).collect::<Vec<_>>();
        assert_eq!(order, vec!["Head", "Inner", "Tail", "Outer"]);
    }

    #[test]
    fn test_cycle_detected() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Node", "fields": [
                    { "field_name": "next", "field_type": "Node" }
                ] }
            ] }
            "#,
        );
        assert_eq!(
            declare_all(&protocol).unwrap_err(),
            Error::CycleDetected { type_id: "Node".to_owned() }
        );

        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "A", "fields": [
                    { "field_name": "b", "field_type":
                        { "kind": "Array", "name": "Bs", "element_type": "B" } }
                ] },
                { "kind": "Enum", "name": "B", "variants": [ "A" ] }
            ] }
            "#,
        );
        // The fields of the struct variant `A` are attached to `B`,
        // the cycle closes on the array.
        assert_eq!(
            declare_all(&protocol).unwrap_err(),
            Error::CycleDetected { type_id: "Bs".to_owned() }
        );
    }

    #[test]
    fn test_unsupported_member_kind() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Header", "fields": [
                    { "field_name": "check", "field_type": { "kind": "Function", "name": "crc" } }
                ] }
            ] }
            "#,
        );
        assert_eq!(
            declare_all(&protocol).unwrap_err(),
            Error::UnsupportedFieldKind {
                type_id: "Header".to_owned(),
                field_id: "check".to_owned(),
                kind: "function",
            }
        );
    }

    #[test]
    fn test_invalid_field_size() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Header", "fields": [
                    { "field_name": "pad", "field_type": { "kind": "BitString", "name": "Pad", "size": 0 } }
                ] }
            ] }
            "#,
        );
        assert_eq!(
            declare_all(&protocol).unwrap_err(),
            Error::InvalidFieldSize { type_id: "Pad".to_owned(), size: 0 }
        );
    }

    #[test]
    fn test_identifier_collision() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "BitString", "name": "seq_number", "size": 8 },
                { "kind": "BitString", "name": "SeqNumber", "size": 8 }
            ] }
            "#,
        );
        assert_eq!(
            declare_all(&protocol).unwrap_err(),
            Error::NameCollision { type_id: "SeqNumber".to_owned() }
        );
    }

    #[test]
    fn test_unsatisfied_capabilities() {
        let protocol = parse(
            r#"
            { "name": "Test", "types": [
                { "kind": "Struct", "name": "Plain", "fields": [] },
                { "kind": "Enum", "name": "Command", "traits": ["Ordinal"], "variants": [
                    { "kind": "BitString", "name": "Code", "size": 3 },
                    { "kind": "Function", "name": "Reset" },
                    { "kind": "Context", "name": "Session" }
                ] },
                { "kind": "Struct", "name": "Packet", "traits": ["Equality"], "fields": [
                    { "field_name": "command", "field_type": "Command" },
                    { "field_name": "plain", "field_type": "Plain" }
                ] }
            ] }
            "#,
        );
        let scope = Scope::new(&protocol).unwrap();
        let declarations = Declarations::new(&scope);
        let command = protocol.get_type("Command").unwrap();
        let packet = protocol.get_type("Packet").unwrap();
        assert_eq!(declarations.unsatisfied_capabilities(command), vec![]);
        assert_eq!(declarations.unsatisfied_capabilities(packet), vec![(
            "Plain",
            Capability::Equality
        )]);
    }

    #[test]
    fn test_reserved_identifier() {
        for name in ["BitCursor", "DecodeError", "Result", "vec", "ok"] {
            let protocol = parse(&format!(
                r#"{{ "name": "Test", "types": [
                    {{ "kind": "BitString", "name": "{name}", "size": 8 }}
                ] }}"#
            ));
            assert_eq!(
                declare_all(&protocol).unwrap_err(),
                Error::NameCollision { type_id: name.to_owned() }
            );
        }
    }
}

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
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;

/// List of unique errors reported during generation.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidFieldSize = 1,
    UnsupportedFieldKind = 2,
    CycleDetected = 3,
    NameCollision = 4,
    UndeclaredType = 5,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Generation failure.
/// Each variant names the offending type, and field when relevant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("bitstring `{type_id}` has invalid size {size}")]
    InvalidFieldSize { type_id: String, size: i64 },
    #[error("field `{field_id}` of `{type_id}` has {kind} type, which is not supported here")]
    UnsupportedFieldKind { type_id: String, field_id: String, kind: &'static str },
    #[error("recursive declaration of `{type_id}`")]
    CycleDetected { type_id: String },
    #[error("redeclaration of type identifier `{type_id}`")]
    NameCollision { type_id: String },
    #[error("undeclared type identifier `{type_id}` referenced by `{referenced_by}`")]
    UndeclaredType { type_id: String, referenced_by: String },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidFieldSize { .. } => ErrorCode::InvalidFieldSize,
            Error::UnsupportedFieldKind { .. } => ErrorCode::UnsupportedFieldKind,
            Error::CycleDetected { .. } => ErrorCode::CycleDetected,
            Error::NameCollision { .. } => ErrorCode::NameCollision,
            Error::UndeclaredType { .. } => ErrorCode::UndeclaredType,
        }
    }

    /// Identifier of the type the error is reported on.
    pub fn type_id(&self) -> &str {
        match self {
            Error::InvalidFieldSize { type_id, .. }
            | Error::UnsupportedFieldKind { type_id, .. }
            | Error::CycleDetected { type_id }
            | Error::NameCollision { type_id }
            | Error::UndeclaredType { type_id, .. } => type_id,
        }
    }

    /// Convert the error into a diagnostic for terminal reporting.
    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let hint = match self {
            Error::InvalidFieldSize { .. } => "hint: bitstring sizes must be positive",
            Error::UnsupportedFieldKind { .. } => {
                "hint: only bitstring, struct and array types can be decoded"
            }
            Error::CycleDetected { .. } => "hint: a type cannot contain itself",
            Error::NameCollision { .. } => "hint: type identifiers must be unique",
            Error::UndeclaredType { .. } => "hint: expected a type declared in the protocol",
        };
        Diagnostic::error()
            .with_code(self.code())
            .with_message(self.to_string())
            .with_notes(vec![hint.to_owned()])
    }
}

/// Gather information about the full IR.
#[derive(Debug)]
pub struct Scope<'d> {
    /// Reference to the protocol.
    pub protocol: &'d Protocol,
    /// Collection of all type definitions, top-level and inline.
    pub typedef: HashMap<&'d str, &'d ProtocolType>,
}

impl<'d> Scope<'d> {
    pub fn new(protocol: &'d Protocol) -> Result<Scope<'d>, Error> {
        fn collect<'d>(
            def: &'d ProtocolType,
            typedef: &mut HashMap<&'d str, &'d ProtocolType>,
        ) -> Result<(), Error> {
            match typedef.get(def.id()) {
                // Inline copy of an already collected definition.
                Some(prev) if *prev == def => return Ok(()),
                Some(_) => return Err(Error::NameCollision { type_id: def.id().to_owned() }),
                None => (),
            }
            typedef.insert(def.id(), def);
            for type_ref in def.type_refs() {
                if let Some(def) = type_ref.def() {
                    collect(def, typedef)?;
                }
            }
            Ok(())
        }

        // Gather definitions.
        let mut typedef = HashMap::new();
        for def in &protocol.types {
            collect(def, &mut typedef)?;
        }

        // Check that references by name are declared. Definitions are
        // visited in protocol order for the error to be deterministic.
        let scope = Scope { protocol, typedef };
        for def in scope.iter_definitions() {
            for type_ref in def.type_refs() {
                scope.resolve(def, type_ref)?;
            }
        }

        Ok(scope)
    }

    /// Iterate over all definitions, depth first in document order.
    /// Repeated inline definitions are produced once per occurrence.
    pub fn iter_definitions(&self) -> impl Iterator<Item = &'d ProtocolType> {
        fn walk<'d>(def: &'d ProtocolType, out: &mut Vec<&'d ProtocolType>) {
            out.push(def);
            for type_ref in def.type_refs() {
                if let Some(def) = type_ref.def() {
                    walk(def, out);
                }
            }
        }

        let mut definitions = vec![];
        for def in &self.protocol.types {
            walk(def, &mut definitions);
        }
        definitions.into_iter()
    }

    /// Return the definition of a referenced type.
    /// `parent` is the type holding the reference.
    pub fn resolve(
        &self,
        parent: &ProtocolType,
        type_ref: &'d TypeRef,
    ) -> Result<&'d ProtocolType, Error> {
        match type_ref {
            TypeRef::Def(def) => Ok(def),
            TypeRef::Id(id) => self.typedef.get(id.as_str()).copied().ok_or_else(|| {
                Error::UndeclaredType { type_id: id.clone(), referenced_by: parent.id().to_owned() }
            }),
        }
    }
}

/// Analyzer entry point, checks that the protocol can be handed to a
/// backend.
pub fn analyze(protocol: &Protocol) -> Result<(), Error> {
    Scope::new(protocol).map(|_| ())
}

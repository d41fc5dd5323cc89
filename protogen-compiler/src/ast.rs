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

//! Protocol intermediate representation.
//!
//! The IR is produced by an external front-end from the protocol
//! documents and exchanged as JSON. It is read-only for the whole
//! duration of a generation run.

use codespan_reporting::files;
use serde::{Deserialize, Serialize};

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

/// Capability requested for a generated type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Trait {
    Equality,
    Ordinal,
}

/// Reference to a protocol type from a field, enum variant or array.
///
/// Definitions are usually given inline. A reference by name points to
/// a type defined elsewhere in the protocol, and is the only way to
/// express self-referencing types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Id(String),
    Def(Box<ProtocolType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub field_name: String,
    pub field_type: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProtocolType {
    BitString {
        name: String,
        size: i64,
    },
    Struct {
        name: String,
        fields: Vec<Field>,
        #[serde(default)]
        traits: Vec<Trait>,
    },
    Enum {
        name: String,
        variants: Vec<TypeRef>,
        #[serde(default)]
        traits: Vec<Trait>,
    },
    Array {
        name: String,
        element_type: TypeRef,
        #[serde(default)]
        length: Option<usize>,
    },
    Function {
        name: String,
    },
    Context {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub types: Vec<ProtocolType>,
}

impl TypeRef {
    /// Name of the referenced type.
    pub fn id(&self) -> &str {
        match self {
            TypeRef::Id(id) => id,
            TypeRef::Def(def) => def.id(),
        }
    }

    /// Return the inline definition, if any.
    pub fn def(&self) -> Option<&ProtocolType> {
        match self {
            TypeRef::Id(_) => None,
            TypeRef::Def(def) => Some(def),
        }
    }
}

impl ProtocolType {
    pub fn id(&self) -> &str {
        match self {
            ProtocolType::BitString { name, .. }
            | ProtocolType::Struct { name, .. }
            | ProtocolType::Enum { name, .. }
            | ProtocolType::Array { name, .. }
            | ProtocolType::Function { name }
            | ProtocolType::Context { name } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolType::BitString { .. } => "bitstring",
            ProtocolType::Struct { .. } => "struct",
            ProtocolType::Enum { .. } => "enum",
            ProtocolType::Array { .. } => "array",
            ProtocolType::Function { .. } => "function",
            ProtocolType::Context { .. } => "context",
        }
    }

    /// Requested capabilities, empty for kinds that cannot carry any.
    pub fn traits(&self) -> &[Trait] {
        match self {
            ProtocolType::Struct { traits, .. } | ProtocolType::Enum { traits, .. } => traits,
            ProtocolType::BitString { .. }
            | ProtocolType::Array { .. }
            | ProtocolType::Function { .. }
            | ProtocolType::Context { .. } => &[],
        }
    }

    /// Iterate over the type references held by this type, in
    /// declaration order.
    pub fn type_refs(&self) -> Box<dyn Iterator<Item = &TypeRef> + '_> {
        match self {
            ProtocolType::Struct { fields, .. } => Box::new(fields.iter().map(|f| &f.field_type)),
            ProtocolType::Enum { variants, .. } => Box::new(variants.iter()),
            ProtocolType::Array { element_type, .. } => Box::new(std::iter::once(element_type)),
            ProtocolType::BitString { .. }
            | ProtocolType::Function { .. }
            | ProtocolType::Context { .. } => Box::new(std::iter::empty()),
        }
    }
}

impl Protocol {
    /// Return the top-level type with the selected name.
    pub fn get_type(&self, id: &str) -> Option<&ProtocolType> {
        self.types.iter().find(|pt| pt.id() == id)
    }
}

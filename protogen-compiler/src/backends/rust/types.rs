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

//! Utility functions for dealing with Rust integer types.

use crate::analyzer::Error;
use quote::{format_ident, quote};

/// A Rust integer type such as `u8`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Integer {
    pub width: usize,
}

impl Integer {
    /// Get the Rust integer type for the given bit width.
    ///
    /// This will round up the size to the nearest Rust integer size.
    /// Any size larger than 64 bits is stored in a `u128`, values
    /// wider than 128 bits are truncated when decoded.
    pub fn new(width: usize) -> Integer {
        for integer_width in [8, 16, 32, 64] {
            if width <= integer_width {
                return Integer { width: integer_width };
            }
        }
        Integer { width: 128 }
    }
}

impl quote::ToTokens for Integer {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let t = format_ident!("u{}", self.width);
        t.to_tokens(tokens);
    }
}

/// Resolve the storage type of a bitstring of `size` bits.
///
/// Sizes must be positive, `id` identifies the bitstring in the
/// reported error.
pub fn resolve_width(id: &str, size: i64) -> Result<Integer, Error> {
    match usize::try_from(size) {
        Ok(width) if width > 0 => Ok(Integer::new(width)),
        _ => Err(Error::InvalidFieldSize { type_id: id.to_owned(), size }),
    }
}

/// Generate the read of a `size` bits value from `cursor`,
/// converted to the storage type.
pub fn read_uint(
    obj: &str,
    size: usize,
    value_type: Integer,
    cursor: &proc_macro2::Ident,
) -> proc_macro2::TokenStream {
    let size = proc_macro2::Literal::usize_unsuffixed(size);
    let cast = (value_type.width < 128).then(|| quote!(as #value_type));
    quote! {
        #cursor.read(#obj, #size)? #cast
    }
}

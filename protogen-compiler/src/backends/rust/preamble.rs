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

use quote::quote;

/// Generate the file preamble.
///
/// The doc comment is an outer comment: the generated code is meant to
/// be expanded inside a module, or included in the middle of one.
pub fn generate(protocol_name: &str) -> proc_macro2::TokenStream {
    let module_doc_string = format!(" @generated rust decoders for protocol {protocol_name}.");
    quote! {
        #[doc = #module_doc_string]
        #[allow(unused_imports)]
        use protogen_runtime::{read_array, read_vec, BitCursor, DecodeError};
    }
}

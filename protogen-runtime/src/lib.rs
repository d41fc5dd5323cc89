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

//! Helper definitions used by the decoders generated by protogen.

/// Type of decoding errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("when decoding {obj} needed {wanted} bits but got {got}")]
    InvalidLengthError { obj: &'static str, wanted: usize, got: usize },
    #[error("array decoding produced {actual} elements, expected {expected}")]
    InvalidArrayLength { expected: usize, actual: usize },
}

/// Read cursor over a byte slice with bit granularity.
///
/// Bits are consumed most significant bit first, which is the
/// transmission order of every field diagram the generator handles.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(buf: &'a [u8]) -> BitCursor<'a> {
        BitCursor { buf, offset: 0 }
    }

    /// Number of bits consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0
    }

    /// Return the bytes not yet touched by the cursor.
    /// A partially consumed byte is not part of the remainder.
    pub fn remainder(&self) -> &'a [u8] {
        &self.buf[(self.offset + 7) / 8..]
    }

    /// Consume `bits` bits and return them as an unsigned value.
    ///
    /// The cursor is left untouched if not enough bits remain. Values
    /// wider than 128 bits keep their least significant 128 bits.
    pub fn read(&mut self, obj: &'static str, bits: usize) -> Result<u128, DecodeError> {
        let got = self.remaining_bits();
        if got < bits {
            return Err(DecodeError::InvalidLengthError { obj, wanted: bits, got });
        }

        let mut value: u128 = 0;
        let mut left = bits;
        while left > 0 {
            let byte = self.buf[self.offset / 8];
            let used = self.offset % 8;
            let take = std::cmp::min(8 - used, left);
            let chunk = (byte >> (8 - used - take)) & (0xff >> (8 - take));
            value = (value << take) | chunk as u128;
            self.offset += take;
            left -= take;
        }
        Ok(value)
    }
}

/// Decode exactly `N` consecutive elements.
pub fn read_array<'a, T, F, const N: usize>(
    cursor: &mut BitCursor<'a>,
    mut element: F,
) -> Result<[T; N], DecodeError>
where
    F: FnMut(&mut BitCursor<'a>) -> Result<T, DecodeError>,
{
    let mut elements = Vec::with_capacity(N);
    for _ in 0..N {
        elements.push(element(cursor)?);
    }
    elements
        .try_into()
        .map_err(|elements: Vec<T>| DecodeError::InvalidArrayLength {
            expected: N,
            actual: elements.len(),
        })
}

/// Decode elements until the input is exhausted.
///
/// Decoding stops early if an element consumes no input, which
/// happens for elements without any bit-level field.
pub fn read_vec<'a, T, F>(cursor: &mut BitCursor<'a>, mut element: F) -> Result<Vec<T>, DecodeError>
where
    F: FnMut(&mut BitCursor<'a>) -> Result<T, DecodeError>,
{
    let mut elements = Vec::new();
    while !cursor.is_empty() {
        let start = cursor.position();
        elements.push(element(cursor)?);
        if cursor.position() == start {
            break;
        }
    }
    Ok(elements)
}

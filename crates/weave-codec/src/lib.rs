// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Self-describing, length-prefixed binary codec.
//!
//! Every wire-carried value in the fabric — primitives, graph entities,
//! message bodies, and user-defined node-program payloads — goes through
//! the [`Packable`] trait: `size` reports the exact encoded length,
//! `pack` appends the encoding to a buffer, and `unpack` is the inverse.
//! Truncated or malformed input returns [`CodecError`]; it never panics
//! or reads past the end of the buffer.

mod containers;
mod cursor;
mod primitives;

pub use cursor::Cursor;

use thiserror::Error;

/// Errors the codec can report. Every decode path returns one of these
/// instead of panicking or indexing out of bounds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a value could be fully decoded.
    #[error("truncated input: need {needed} more byte(s), {available} available")]
    Truncated {
        /// Bytes still required to complete the read.
        needed: usize,
        /// Bytes actually available in the buffer.
        available: usize,
    },
    /// Input had bytes left over after the expected value was decoded.
    #[error("overrun: {remaining} byte(s) left after decoding")]
    Overrun {
        /// Bytes remaining after the decode completed.
        remaining: usize,
    },
    /// A discriminant/tag did not match any known variant.
    #[error("type mismatch: expected {expected}, found tag {found_tag:?}")]
    TypeMismatch {
        /// Human-readable description of what was expected.
        expected: &'static str,
        /// The tag value actually found, if one could be read.
        found_tag: Option<u32>,
    },
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Capability set `{size, pack, unpack}` that a value must provide to
/// ride the wire. Implemented for every primitive and composite
/// container the fabric needs; user-defined node-program parameters and
/// per-node state implement it too, and the codec treats those as
/// opaque.
pub trait Packable: Sized {
    /// Exact number of bytes `pack` will write for this value.
    fn size(&self) -> usize;

    /// Append this value's encoding to `buf`.
    fn pack(&self, buf: &mut Vec<u8>);

    /// Decode a value from the front of `cur`, advancing it past the
    /// bytes consumed.
    fn unpack(cur: &mut Cursor<'_>) -> Result<Self>;

    /// Encode into a freshly allocated, exactly-sized buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.pack(&mut buf);
        buf
    }

    /// Decode a value and assert the buffer was fully consumed.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let val = Self::unpack(&mut cur)?;
        cur.finish()?;
        Ok(val)
    }
}

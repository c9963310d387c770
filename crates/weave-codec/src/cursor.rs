// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounds-checked read cursor shared by every primitive decoder.

use crate::{CodecError, Result};

/// A borrowed byte slice plus a read offset. Every decoder shares the
/// same "not enough bytes left" check through [`Cursor::take`] so that
/// truncated input fails cleanly rather than indexing out of bounds.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Wrap a byte slice for decoding, starting at offset 0.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current read offset from the start of the original buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume and return the next `n` bytes, or `Truncated` if fewer
    /// than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume a fixed-size array of bytes.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Assert the cursor has consumed the whole buffer.
    pub fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(CodecError::Overrun {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

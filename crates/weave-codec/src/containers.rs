// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Packable impls for composite containers: sequences, sets, mappings,
//! options, and tuples.
//!
//! Composite containers prepend their element count; element sizes are
//! summed, not multiplied, so variable-width elements (nested
//! containers, strings) are handled correctly. Decode order for sets
//! and mappings is not guaranteed to match encode order — callers
//! compare the decoded collection, not the byte stream.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::{Cursor, Packable, Result};

impl<T: Packable> Packable for Vec<T> {
    fn size(&self) -> usize {
        8 + self.iter().map(Packable::size).sum::<usize>()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).pack(buf);
        for elem in self {
            elem.pack(buf);
        }
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let count = u64::unpack(cur)? as usize;
        let mut out = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            out.push(T::unpack(cur)?);
        }
        Ok(out)
    }
}

impl<T: Packable + Eq + Hash> Packable for HashSet<T> {
    fn size(&self) -> usize {
        8 + self.iter().map(Packable::size).sum::<usize>()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).pack(buf);
        for elem in self {
            elem.pack(buf);
        }
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let count = u64::unpack(cur)? as usize;
        let mut out = HashSet::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            out.insert(T::unpack(cur)?);
        }
        Ok(out)
    }
}

impl<K: Packable + Eq + Hash, V: Packable> Packable for HashMap<K, V> {
    fn size(&self) -> usize {
        8 + self
            .iter()
            .map(|(k, v)| k.size() + v.size())
            .sum::<usize>()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).pack(buf);
        for (k, v) in self {
            k.pack(buf);
            v.pack(buf);
        }
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let count = u64::unpack(cur)? as usize;
        let mut out = HashMap::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let k = K::unpack(cur)?;
            let v = V::unpack(cur)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<T: Packable> Packable for Option<T> {
    fn size(&self) -> usize {
        2 + self.as_ref().map_or(0, Packable::size)
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        match self {
            Some(v) => {
                true.pack(buf);
                v.pack(buf);
            }
            None => false.pack(buf),
        }
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        if bool::unpack(cur)? {
            Ok(Some(T::unpack(cur)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Packable, B: Packable> Packable for (A, B) {
    fn size(&self) -> usize {
        self.0.size() + self.1.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.0.pack(buf);
        self.1.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let a = A::unpack(cur)?;
        let b = B::unpack(cur)?;
        Ok((a, b))
    }
}

impl<A: Packable, B: Packable, C: Packable> Packable for (A, B, C) {
    fn size(&self) -> usize {
        self.0.size() + self.1.size() + self.2.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.0.pack(buf);
        self.1.pack(buf);
        self.2.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let a = A::unpack(cur)?;
        let b = B::unpack(cur)?;
        let c = C::unpack(cur)?;
        Ok((a, b, c))
    }
}

impl<A: Packable, B: Packable, C: Packable, D: Packable> Packable for (A, B, C, D) {
    fn size(&self) -> usize {
        self.0.size() + self.1.size() + self.2.size() + self.3.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.0.pack(buf);
        self.1.pack(buf);
        self.2.pack(buf);
        self.3.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let a = A::unpack(cur)?;
        let b = B::unpack(cur)?;
        let c = C::unpack(cur)?;
        let d = D::unpack(cur)?;
        Ok((a, b, c, d))
    }
}

impl<A: Packable, B: Packable, C: Packable, D: Packable, E: Packable> Packable for (A, B, C, D, E) {
    fn size(&self) -> usize {
        self.0.size() + self.1.size() + self.2.size() + self.3.size() + self.4.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.0.pack(buf);
        self.1.pack(buf);
        self.2.pack(buf);
        self.3.pack(buf);
        self.4.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let a = A::unpack(cur)?;
        let b = B::unpack(cur)?;
        let c = C::unpack(cur)?;
        let d = D::unpack(cur)?;
        let e = E::unpack(cur)?;
        Ok((a, b, c, d, e))
    }
}

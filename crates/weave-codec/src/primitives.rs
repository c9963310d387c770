// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Packable impls for primitive wire types.

use crate::{CodecError, Cursor, Packable, Result};

impl Packable for bool {
    fn size(&self) -> usize {
        2
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        let v: u16 = u16::from(*self);
        buf.extend_from_slice(&v.to_be_bytes());
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cur.take_array::<2>()?;
        let v = u16::from_be_bytes(bytes);
        match v {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::TypeMismatch {
                expected: "bool (0 or 1)",
                found_tag: Some(u32::from(other)),
            }),
        }
    }
}

macro_rules! impl_packable_uint {
    ($ty:ty, $width:expr) => {
        impl Packable for $ty {
            fn size(&self) -> usize {
                $width
            }

            fn pack(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_be_bytes());
            }

            fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
                let bytes = cur.take_array::<$width>()?;
                Ok(<$ty>::from_be_bytes(bytes))
            }
        }
    };
}

impl_packable_uint!(u16, 2);
impl_packable_uint!(u32, 4);
impl_packable_uint!(u64, 8);
impl_packable_uint!(i16, 2);
impl_packable_uint!(i32, 4);
impl_packable_uint!(i64, 8);

impl Packable for f64 {
    fn size(&self) -> usize {
        8
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        // Bit-pattern copy, not a numeric conversion.
        buf.extend_from_slice(&self.to_bits().to_be_bytes());
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cur.take_array::<8>()?;
        Ok(f64::from_bits(u64::from_be_bytes(bytes)))
    }
}

impl Packable for String {
    fn size(&self) -> usize {
        8 + self.len()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).pack(buf);
        buf.extend_from_slice(self.as_bytes());
    }

    fn unpack(cur: &mut Cursor<'_>) -> Result<Self> {
        let len = u64::unpack(cur)? as usize;
        let bytes = cur.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::TypeMismatch {
            expected: "utf-8 string",
            found_tag: None,
        })
    }
}

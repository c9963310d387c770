// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Message envelope and wire framing.
//!
//! A message is `(kind, buffer)` where `buffer` begins with a fixed
//! transport header (opaque to this layer) followed by a 32-bit kind
//! tag and a kind-dependent body. `prepare` packs a kind plus its
//! arguments into a body; `parse` checks the kind and decodes the
//! arguments back out.

mod kind;

pub use kind::MsgKind;

use thiserror::Error;
use weave_codec::{CodecError, Cursor, Packable};

/// Deployment constant: size of the transport header this layer leaves
/// opaque and untouched. Set once at process init, never mutated.
pub const TRANSPORT_HEADER_SIZE: usize = 4;

/// Opaque transport header. `weave-proto` copies it but never
/// interprets its contents — that is the transport collaborator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader(pub [u8; TRANSPORT_HEADER_SIZE]);

impl Default for TransportHeader {
    fn default() -> Self {
        Self([0u8; TRANSPORT_HEADER_SIZE])
    }
}

/// Errors raised while framing or parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// A codec-level error while packing/unpacking a body.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// The frame was shorter than the transport header.
    #[error("frame too short for transport header: {len} byte(s)")]
    ShortFrame {
        /// Length of the frame actually received.
        len: usize,
    },
    /// `parse` was called with a kind that did not match the frame.
    #[error("kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// Kind the caller expected.
        expected: MsgKind,
        /// Kind actually decoded from the frame, if recognized.
        found: Option<MsgKind>,
    },
}

/// A parsed message: its kind plus the still-packed body bytes
/// (everything after the transport header and kind tag).
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The message kind.
    pub kind: MsgKind,
    /// The transport header, copied through unchanged.
    pub header: TransportHeader,
    /// Packed argument bytes for this kind.
    pub body: Vec<u8>,
}

/// Pack `args` into a message body of kind `kind`: the kind tag followed
/// by `args.pack(..)`. Does not include the transport header — callers
/// that need a full wire frame use [`prepare_framed`].
pub fn prepare<T: Packable>(kind: MsgKind, args: &T) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + args.size());
    (kind as u32).pack(&mut buf);
    args.pack(&mut buf);
    buf
}

/// Like [`prepare`], but prefixes the transport header to produce a
/// complete `[header][kind][body]` wire frame.
pub fn prepare_framed<T: Packable>(header: TransportHeader, kind: MsgKind, args: &T) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TRANSPORT_HEADER_SIZE + 4 + args.size());
    buf.extend_from_slice(&header.0);
    (kind as u32).pack(&mut buf);
    args.pack(&mut buf);
    buf
}

/// Decode a body (kind tag + args) and enforce that its kind matches
/// `expected_kind`; mismatch is a fatal protocol error per §4.3.
pub fn parse<T: Packable>(body: &[u8], expected_kind: MsgKind) -> Result<T, ProtoError> {
    let mut cur = Cursor::new(body);
    let tag = u32::unpack(&mut cur)?;
    if tag != expected_kind as u32 {
        return Err(ProtoError::KindMismatch {
            expected: expected_kind,
            found: MsgKind::from_u32(tag),
        });
    }
    let args = T::unpack(&mut cur)?;
    cur.finish()?;
    Ok(args)
}

/// Split a full wire frame into its transport header and the remaining
/// `[kind][body]` bytes.
pub fn split_frame(frame: &[u8]) -> Result<(TransportHeader, &[u8]), ProtoError> {
    if frame.len() < TRANSPORT_HEADER_SIZE {
        return Err(ProtoError::ShortFrame { len: frame.len() });
    }
    let mut header = [0u8; TRANSPORT_HEADER_SIZE];
    header.copy_from_slice(&frame[..TRANSPORT_HEADER_SIZE]);
    Ok((TransportHeader(header), &frame[TRANSPORT_HEADER_SIZE..]))
}

/// Read just the kind tag from a `[kind][body]` byte slice, without
/// decoding the body. Useful for dispatch tables that need to pick a
/// handler before committing to a concrete argument type.
pub fn peek_kind(body: &[u8]) -> Result<MsgKind, ProtoError> {
    let mut cur = Cursor::new(body);
    let tag = u32::unpack(&mut cur)?;
    MsgKind::from_u32(tag).ok_or(ProtoError::KindMismatch {
        expected: MsgKind::Error,
        found: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_then_parse_roundtrips() {
        let body = prepare(MsgKind::ClientReachableReq, &(7u64, 3u32));
        let (a, b): (u64, u32) = parse(&body, MsgKind::ClientReachableReq).expect("parse");
        assert_eq!((a, b), (7, 3));
    }

    #[test]
    fn kind_mismatch_is_fatal() {
        let body = prepare(MsgKind::ClientReachableReq, &42u64);
        let err = parse::<u64>(&body, MsgKind::NodeProg).unwrap_err();
        assert!(matches!(err, ProtoError::KindMismatch { .. }));
    }

    #[test]
    fn framed_roundtrip_preserves_header() {
        let header = TransportHeader([1, 2, 3, 4]);
        let frame = prepare_framed(header, MsgKind::Error, &9u64);
        let (h, body) = split_frame(&frame).expect("split");
        assert_eq!(h, header);
        let v: u64 = parse(body, MsgKind::Error).expect("parse");
        assert_eq!(v, 9);
    }

    #[test]
    fn enum_discriminants_are_appended_in_family_order() {
        assert_eq!(MsgKind::ClientNodeCreateReq as u32, 0);
        assert!((MsgKind::ClientNodeProgReq as u32) > (MsgKind::NodeProg as u32));
        assert!((MsgKind::Error as u32) > (MsgKind::ClientNodeProgReply as u32));
    }
}

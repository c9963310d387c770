// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The unified error boundary for node-program dispatch.

use thiserror::Error;
use weave_codec::CodecError;
use weave_graph::RemoteNode;
use weave_storage::StorageError;
use weave_transport::TransportError;

use crate::program::ProgramType;
use crate::ReqId;

/// Errors surfaced while dispatching or routing a node-program
/// continuation. Unifies the codec, transport, and storage layers'
/// errors with the runtime's own, so call sites match one type instead
/// of threading per-layer errors by hand.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// A wire-level decode/encode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// A framing/envelope-level failure (kind mismatch, truncated frame).
    #[error("protocol error: {0}")]
    Proto(#[from] weave_proto::ProtoError),
    /// The peer shard was unreachable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A storage-layer lookup or mutation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// No program is registered under this tag.
    #[error("program type {0:?} is not registered")]
    UnknownProgram(ProgramType),
    /// The continuation's target has never been resident on this
    /// shard.
    #[error("node {0:?} is not known to this shard")]
    UnknownNode(RemoteNode),
    /// The continuation's target used to live here but has since been
    /// migrated elsewhere.
    #[error("node migrated to shard {new_location}")]
    MigratedNode {
        /// Shard the node now lives on, if known.
        new_location: u32,
    },
    /// The request's deadline has passed.
    #[error("request {0} timed out")]
    Timeout(ReqId),
    /// The client abandoned the request.
    #[error("request {0} was cancelled")]
    Cancelled(ReqId),
}

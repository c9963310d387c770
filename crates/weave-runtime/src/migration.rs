// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reply a shard sends back to whoever forwarded it a continuation for
//! a node that has since migrated elsewhere: "retry at this location"
//! rather than the old shard silently forwarding on the sender's
//! behalf.

use weave_codec::{Cursor, Packable, Result as CodecResult};
use weave_graph::ShardId;

use crate::continuation::NodeProgContinuation;

/// Sent from the shard a node used to live on back to the shard that
/// just addressed a continuation to it there.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedNbrUpdate {
    /// Shard the node lives on now.
    pub new_location: ShardId,
    /// The continuation to retry at `new_location`.
    pub continuation: NodeProgContinuation,
}

impl Packable for MigratedNbrUpdate {
    fn size(&self) -> usize {
        self.new_location.size() + self.continuation.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.new_location.pack(buf);
        self.continuation.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        let new_location = ShardId::unpack(cur)?;
        let continuation = NodeProgContinuation::unpack(cur)?;
        Ok(Self {
            new_location,
            continuation,
        })
    }
}

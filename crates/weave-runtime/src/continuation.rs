// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The wire shape of one node-program continuation: everything a
//! receiving shard needs to look up (or create) a node, find the right
//! program and state slot, and invoke it.

use weave_codec::{Cursor, Packable, Result as CodecResult};
use weave_graph::{RemoteNode, VectorClock};

use crate::program::ProgramType;
use crate::ReqId;

/// `deliver params to target_handle; run prog_type there next`, plus
/// the request identity and clock that key program state across the
/// cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProgContinuation {
    /// Which registered program should handle this hop.
    pub prog_type: ProgramType,
    /// Request this continuation belongs to.
    pub req_id: ReqId,
    /// The request's observing clock.
    pub req_clock: VectorClock,
    /// Node this continuation is addressed to.
    pub target: RemoteNode,
    /// The program's own parameter encoding for this hop.
    pub params: Vec<u8>,
}

impl Packable for NodeProgContinuation {
    fn size(&self) -> usize {
        self.prog_type.size()
            + self.req_id.size()
            + self.req_clock.size()
            + self.target.size()
            + self.params.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.prog_type.pack(buf);
        self.req_id.pack(buf);
        self.req_clock.pack(buf);
        self.target.pack(buf);
        self.params.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        let prog_type = ProgramType::unpack(cur)?;
        let req_id = ReqId::unpack(cur)?;
        let req_clock = VectorClock::unpack(cur)?;
        let target = RemoteNode::unpack(cur)?;
        let params = Vec::<u8>::unpack(cur)?;
        Ok(Self {
            prog_type,
            req_id,
            req_clock,
            target,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_roundtrips_through_codec() {
        let c = NodeProgContinuation {
            prog_type: ProgramType::Reachability,
            req_id: 7,
            req_clock: VectorClock::new(0, vec![1, 2]),
            target: RemoteNode::new(1, 42),
            params: vec![9, 9, 9],
        };
        let bytes = c.to_bytes();
        assert_eq!(bytes.len(), c.size());
        assert_eq!(NodeProgContinuation::from_bytes(&bytes).unwrap(), c);
    }
}

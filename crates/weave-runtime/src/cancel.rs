// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire messages for abandoning an in-flight node-program request.

use weave_codec::{Cursor, Packable, Result as CodecResult};

use crate::ReqId;

/// Client-to-coordinator: abandon the request tagged `client_tag`. The
/// client never learns the coordinator-assigned `req_id`, so this is
/// the only handle it has to cancel by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCancelReq {
    /// The tag originally passed to `ClientNodeProgReq`.
    pub client_tag: u64,
}

impl Packable for ClientCancelReq {
    fn size(&self) -> usize {
        self.client_tag.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.client_tag.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            client_tag: u64::unpack(cur)?,
        })
    }
}

/// Coordinator-to-shard: drop every local state slot held for `req_id`
/// and remember it as cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelNodeProg {
    /// The request whose state should be dropped.
    pub req_id: ReqId,
}

impl Packable for CancelNodeProg {
    fn size(&self) -> usize {
        self.req_id.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.req_id.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            req_id: ReqId::unpack(cur)?,
        })
    }
}

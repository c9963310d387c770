// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The client-facing front door. A coordinator assigns request
//! identity and a read clock, forwards a client's start list to the
//! shards that own each starting node, and — once a program's
//! aggregator emits its single terminal report back to the
//! coordinator's own [`Location`] — routes the result to whichever
//! client asked for it. It never decodes a program's own parameter or
//! result schema; those bytes pass through untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use weave_codec::{CodecError, Cursor, Packable, Result as CodecResult};
use weave_graph::{RemoteNode, ShardId, VectorClock};
use weave_proto::MsgKind;
use weave_transport::{Location, Transport};

use crate::cancel::{CancelNodeProg, ClientCancelReq};
use crate::continuation::NodeProgContinuation;
use crate::error::WeaveError;
use crate::program::ProgramType;
use crate::ReqId;

/// A client's node-program start list, addressed to the coordinator.
/// Each `(handle, params)` pair becomes that program's hop-0
/// continuation on the shard owning `handle`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNodeProgReq {
    /// Chosen by the client, carried through unread, and echoed back in
    /// the reply — lets a client with several requests in flight over
    /// one connection tell their replies apart before it has learned
    /// the `req_id` the coordinator is about to assign.
    pub client_tag: u64,
    /// Which registered program to run.
    pub prog_type: ProgramType,
    /// Starting nodes and each one's initial parameter encoding.
    pub starts: Vec<(RemoteNode, Vec<u8>)>,
}

impl Packable for ClientNodeProgReq {
    fn size(&self) -> usize {
        self.client_tag.size() + self.prog_type.size() + self.starts.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.client_tag.pack(buf);
        self.prog_type.pack(buf);
        self.starts.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            client_tag: u64::unpack(cur)?,
            prog_type: ProgramType::unpack(cur)?,
            starts: Vec::<(RemoteNode, Vec<u8>)>::unpack(cur)?,
        })
    }
}

/// The coordinator's reply: the caller's own correlation tag, the
/// request id the coordinator assigned, and the program's raw result
/// bytes (decoded by the client against that program's own result
/// type).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNodeProgReply {
    /// Echoed back from the matching [`ClientNodeProgReq`].
    pub client_tag: u64,
    /// Request this reply answers.
    pub req_id: ReqId,
    /// Encoded program result, passed through unread.
    pub result: Vec<u8>,
}

impl Packable for ClientNodeProgReply {
    fn size(&self) -> usize {
        self.client_tag.size() + self.req_id.size() + self.result.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.client_tag.pack(buf);
        self.req_id.pack(buf);
        self.result.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            client_tag: u64::unpack(cur)?,
            req_id: ReqId::unpack(cur)?,
            result: Vec::<u8>::unpack(cur)?,
        })
    }
}

/// What the coordinator remembers about one outstanding request: which
/// client asked for it (and that client's own correlation tag), so the
/// eventual terminal report can be routed home, and which shards its
/// start list touched, so a cancel can be forwarded to exactly those.
struct PendingRequest {
    client_loc: Location,
    client_tag: u64,
    shards: Vec<ShardId>,
}

/// Tracks exactly one thing per outstanding request: which client asked
/// for it and which shards it touched, so a terminal report can be
/// routed home and a cancel can be forwarded on.
pub struct Coordinator<T: Transport> {
    location: Location,
    transport: Arc<T>,
    num_shards: usize,
    next_req_id: AtomicU64,
    pending: DashMap<ReqId, PendingRequest>,
    tag_to_req: DashMap<u64, ReqId>,
}

impl<T: Transport> Coordinator<T> {
    /// Build a coordinator reachable at `location`, aware of
    /// `num_shards` shards (used to size the all-visible read clock
    /// handed to every request — see the module's design note below).
    #[must_use]
    pub fn new(location: Location, transport: Arc<T>, num_shards: usize) -> Self {
        Self {
            location,
            transport,
            num_shards,
            next_req_id: AtomicU64::new(0),
            pending: DashMap::new(),
            tag_to_req: DashMap::new(),
        }
    }

    /// This coordinator's own endpoint.
    #[must_use]
    pub fn location(&self) -> Location {
        self.location
    }

    /// The shared transport handle, so a pool can poll the same
    /// endpoint this coordinator sends from.
    #[must_use]
    pub fn transport_handle(&self) -> Arc<T> {
        self.transport.clone()
    }

    /// How many requests are currently awaiting their terminal report.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Dispatch one inbound message body: either a client's start
    /// request, or a program's terminal continuation addressed back to
    /// this coordinator.
    pub async fn handle_inbound_body(&self, from: Location, body: &[u8]) -> Result<(), WeaveError> {
        match weave_proto::peek_kind(body)? {
            MsgKind::ClientNodeProgReq => self.handle_client_request(from, body).await,
            MsgKind::ClientCancelReq => self.handle_client_cancel(body).await,
            MsgKind::NodeProg => self.handle_terminal_continuation(body).await,
            other => Err(WeaveError::Codec(CodecError::TypeMismatch {
                expected: "ClientNodeProgReq, ClientCancelReq, or NodeProg message kind",
                found_tag: Some(other as u32),
            })),
        }
    }

    async fn handle_client_request(&self, from: Location, body: &[u8]) -> Result<(), WeaveError> {
        let req: ClientNodeProgReq = weave_proto::parse(body, MsgKind::ClientNodeProgReq)?;
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let shards: Vec<ShardId> = req.starts.iter().map(|(target, _)| target.loc).collect();
        self.pending.insert(
            req_id,
            PendingRequest {
                client_loc: from,
                client_tag: req.client_tag,
                shards,
            },
        );
        self.tag_to_req.insert(req.client_tag, req_id);

        // No clock-gossip protocol is implemented, so every request
        // reads as of "everything committed so far" rather than a
        // true point-in-time snapshot: a clock whose every component
        // is saturated dominates any real creation/deletion clock a
        // shard could hold.
        let req_clock = VectorClock::new(self.location.0, vec![u64::MAX; self.num_shards]);

        for (target, params) in req.starts {
            let continuation = NodeProgContinuation {
                prog_type: req.prog_type,
                req_id,
                req_clock: req_clock.clone(),
                target,
                params,
            };
            self.forward(target.loc, &continuation).await?;
        }
        Ok(())
    }

    async fn handle_client_cancel(&self, body: &[u8]) -> Result<(), WeaveError> {
        let cancel: ClientCancelReq = weave_proto::parse(body, MsgKind::ClientCancelReq)?;
        let Some((_, req_id)) = self.tag_to_req.remove(&cancel.client_tag) else {
            return Ok(());
        };
        let Some((_, pending)) = self.pending.remove(&req_id) else {
            return Ok(());
        };
        let msg = CancelNodeProg { req_id };
        let body = weave_proto::prepare(MsgKind::CancelNodeProg, &msg);
        for shard in pending.shards {
            self.transport.send(Location(shard), Bytes::from(body.clone())).await?;
        }
        Ok(())
    }

    async fn handle_terminal_continuation(&self, body: &[u8]) -> Result<(), WeaveError> {
        let continuation: NodeProgContinuation = weave_proto::parse(body, MsgKind::NodeProg)?;
        let Some((_, pending)) = self.pending.remove(&continuation.req_id) else {
            // Late arrival for a cancelled/already-answered/unknown
            // request; nothing left to route it to.
            return Ok(());
        };
        self.tag_to_req.remove(&pending.client_tag);
        let reply = ClientNodeProgReply {
            client_tag: pending.client_tag,
            req_id: continuation.req_id,
            result: continuation.params,
        };
        let body = weave_proto::prepare(MsgKind::ClientNodeProgReply, &reply);
        self.transport.send(pending.client_loc, Bytes::from(body)).await?;
        Ok(())
    }

    async fn forward(&self, loc: ShardId, continuation: &NodeProgContinuation) -> Result<(), WeaveError> {
        let body = weave_proto::prepare(MsgKind::NodeProg, continuation);
        self.transport.send(Location(loc), Bytes::from(body)).await?;
        Ok(())
    }
}

/// A running set of tasks draining a coordinator's inbound transport,
/// mirroring [`crate::WorkerPool`]'s shape for the single coordinator
/// endpoint rather than a shard's.
pub struct CoordinatorPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl CoordinatorPool {
    /// Spawn `worker_count` tasks (clamped to at least one) each
    /// looping `recv` → dispatch against `coordinator`.
    pub fn spawn<T>(worker_count: usize, coordinator: Arc<Coordinator<T>>) -> Self
    where
        T: Transport + 'static,
    {
        let transport = coordinator.transport_handle();
        let mut handles = Vec::with_capacity(worker_count.max(1));
        for _ in 0..worker_count.max(1) {
            let coordinator = coordinator.clone();
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let Some((from, bytes)) = transport.recv().await else {
                        break;
                    };
                    if let Err(err) = coordinator.handle_inbound_body(from, &bytes).await {
                        tracing::warn!(error = %err, "coordinator dispatch failed");
                    }
                }
            }));
        }
        Self { handles }
    }

    /// Wait for every task to finish (their transport shut down).
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "coordinator task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramRegistry;
    use crate::reachability::{ReachabilityParams, ReachabilityResult};
    use crate::shard_runtime::ShardRuntime;
    use crate::worker_pool::WorkerPool;
    use std::time::Duration;
    use weave_storage::MemStore;
    use weave_transport::LoopbackNetwork;

    #[tokio::test]
    async fn client_request_round_trips_through_the_coordinator() {
        let net = LoopbackNetwork::new();
        let shard_transport = net.endpoint(Location(1), 8);
        let coord_transport = net.endpoint(Location(99), 8);
        let client_transport = net.endpoint(Location(50), 8);

        let shard = Arc::new(ShardRuntime::new(
            1,
            Arc::new(MemStore::new()),
            Arc::new(shard_transport),
            ProgramRegistry::with_builtins(),
            Duration::from_secs(5),
        ));
        let _shard_pool = WorkerPool::spawn(1, shard);

        let coordinator = Arc::new(Coordinator::new(Location(99), Arc::new(coord_transport), 2));
        let _coord_pool = CoordinatorPool::spawn(1, coordinator);

        let dest = RemoteNode::new(1, 1);
        let report_to = RemoteNode::new(99, 0);
        let req = ClientNodeProgReq {
            client_tag: 42,
            prog_type: ProgramType::Reachability,
            starts: vec![(
                dest,
                ReachabilityParams {
                    dest,
                    report_to,
                    hops: 0,
                    max_hops: 5,
                }
                .to_bytes(),
            )],
        };
        let body = weave_proto::prepare(MsgKind::ClientNodeProgReq, &req);
        client_transport
            .send(Location(99), Bytes::from(body))
            .await
            .unwrap();

        let (_from, reply_bytes) = tokio::time::timeout(Duration::from_secs(1), client_transport.recv())
            .await
            .expect("reply within deadline")
            .expect("reply delivered");
        let reply: ClientNodeProgReply =
            weave_proto::parse(&reply_bytes, MsgKind::ClientNodeProgReply).unwrap();
        let result = ReachabilityResult::from_bytes(&reply.result).unwrap();
        assert!(result.reachable);
        assert_eq!(result.hops, 0);
        assert_eq!(reply.client_tag, 42);
    }

    #[tokio::test]
    async fn late_terminal_report_for_an_unknown_request_is_dropped() {
        let net = LoopbackNetwork::new();
        let coord_transport = net.endpoint(Location(99), 8);
        let coordinator = Coordinator::new(Location(99), Arc::new(coord_transport), 1);

        let continuation = NodeProgContinuation {
            prog_type: ProgramType::Reachability,
            req_id: 404,
            req_clock: VectorClock::new(0, vec![1]),
            target: RemoteNode::new(99, 0),
            params: ReachabilityResult { reachable: true, hops: 0 }.to_bytes(),
        };
        let body = weave_proto::prepare(MsgKind::NodeProg, &continuation);
        coordinator.handle_inbound_body(Location(1), &body).await.unwrap();
        assert_eq!(coordinator.pending_count(), 0);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-shard dispatch loop: decode one `NodeProg` continuation,
//! run it against local storage, and forward whatever continuations
//! it produces — to a peer shard, to this same shard's own inbound
//! queue, or to an arbitrary coordinator endpoint — uniformly through
//! [`Transport::send`]. No call site distinguishes "local" from
//! "remote" delivery; a continuation's `target.loc` is simply another
//! [`Location`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use weave_codec::Packable;
use weave_graph::{NodeId, RemoteNode, ShardId};
use weave_proto::MsgKind;
use weave_storage::Store;
use weave_transport::{Location, Transport};

use crate::continuation::NodeProgContinuation;
use crate::error::WeaveError;
use crate::migration::MigratedNbrUpdate;
use crate::program::{ProgramRegistry, ProgramType};
use crate::request_table::RequestTable;
use crate::ReqId;

type SlotKey = (ProgramType, ReqId, NodeId);
type Slot = std::sync::Mutex<Box<dyn std::any::Any + Send>>;

/// Everything one shard process needs to execute node programs: its
/// own identity, the programs it knows how to run, the nodes it owns,
/// a way to reach every other endpoint in the cluster, and the
/// bookkeeping that lets a request be timed out or cancelled cleanly.
pub struct ShardRuntime<T: Transport> {
    shard_id: ShardId,
    registry: ProgramRegistry,
    store: Arc<dyn Store>,
    transport: Arc<T>,
    requests: RequestTable,
    state_slots: DashMap<SlotKey, Slot>,
    /// Overrides for nodes that used to live here but migrated away.
    /// Consulted before touching local storage so a continuation
    /// addressed to a stale handle gets a `MIGRATED_NBR_UPDATE` reply
    /// naming the new location, rather than this shard silently
    /// reanimating a node it no longer owns.
    location_cache: DashMap<NodeId, ShardId>,
    request_timeout: Duration,
}

impl<T: Transport> ShardRuntime<T> {
    /// Build a runtime for `shard_id`, backed by `store` and reachable
    /// peers via `transport`. `request_timeout` is the deadline armed
    /// the first time any request touches a state slot on this shard.
    #[must_use]
    pub fn new(
        shard_id: ShardId,
        store: Arc<dyn Store>,
        transport: Arc<T>,
        registry: ProgramRegistry,
        request_timeout: Duration,
    ) -> Self {
        Self {
            shard_id,
            registry,
            store,
            transport,
            requests: RequestTable::new(),
            state_slots: DashMap::new(),
            location_cache: DashMap::new(),
            request_timeout,
        }
    }

    /// This shard's own identity.
    #[must_use]
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// The shared transport handle, so a worker pool can poll the same
    /// endpoint this runtime sends from.
    #[must_use]
    pub fn transport_handle(&self) -> Arc<T> {
        self.transport.clone()
    }

    /// The request bookkeeping table, so callers can time out or
    /// cancel a request from outside the dispatch loop.
    #[must_use]
    pub fn requests(&self) -> &RequestTable {
        &self.requests
    }

    /// Record that `node_id` migrated to `new_shard`. Any continuation
    /// subsequently addressed here for `node_id` is forwarded to
    /// `new_shard` instead of touching local storage.
    pub fn record_migration(&self, node_id: NodeId, new_shard: ShardId) {
        self.location_cache.insert(node_id, new_shard);
    }

    /// Forget a request: drop its local state slots and mark it
    /// cancelled so any continuation that arrives afterward is dropped
    /// rather than reviving dead state.
    pub fn cancel_request(&self, req_id: ReqId) {
        self.state_slots.retain(|key, _| key.1 != req_id);
        self.requests.cancel(req_id);
    }

    /// Decode a raw `NodeProg` message body, received from `from`, and
    /// dispatch it.
    pub async fn handle_node_prog_body(
        &self,
        body: &[u8],
        from: Location,
    ) -> Result<(), WeaveError> {
        let continuation: NodeProgContinuation = weave_proto::parse(body, MsgKind::NodeProg)?;
        self.handle_continuation(continuation, from).await
    }

    /// Run one continuation's hop: resolve migration, run the program
    /// against local storage, and forward every resulting continuation.
    /// `from` is the sender's endpoint, used to reply with a
    /// `MIGRATED_NBR_UPDATE` if `target` has since moved elsewhere.
    pub async fn handle_continuation(
        &self,
        continuation: NodeProgContinuation,
        from: Location,
    ) -> Result<(), WeaveError> {
        let NodeProgContinuation {
            prog_type,
            req_id,
            req_clock,
            target,
            params,
        } = continuation;

        if self.requests.is_cancelled(req_id) {
            return Ok(());
        }
        if self.requests.is_expired(req_id, Instant::now()) {
            self.cancel_request(req_id);
            return Err(WeaveError::Timeout(req_id));
        }

        if let Some(new_shard) = self.location_cache.get(&target.handle).map(|e| *e.value()) {
            if new_shard != self.shard_id {
                let update = MigratedNbrUpdate {
                    new_location: new_shard,
                    continuation: NodeProgContinuation {
                        prog_type,
                        req_id,
                        req_clock,
                        target,
                        params,
                    },
                };
                let body = weave_proto::prepare(MsgKind::MigratedNbrUpdate, &update);
                self.transport.send(from, Bytes::from(body)).await?;
                return Err(WeaveError::MigratedNode {
                    new_location: new_shard,
                });
            }
        }

        // `target.loc` is the shard its handle claims to live on (see
        // `RemoteNode::loc`'s own doc comment). Ordinary delivery always
        // lands here with the two equal, since every sender addresses a
        // continuation by that same field; a mismatch means stale or
        // buggy routing got this message to the wrong shard, and
        // creating the handle here anyway would phantom-own a node this
        // shard has no claim to.
        if target.loc != self.shard_id {
            return Err(WeaveError::UnknownNode(target));
        }

        let program = self
            .registry
            .get(prog_type)
            .ok_or(WeaveError::UnknownProgram(prog_type))?;

        let node_cell = self.store.get_or_create_node(target.handle, &req_clock);
        let slot_key = (prog_type, req_id, target.handle);
        let slot_is_new = !self.state_slots.contains_key(&slot_key);
        if slot_is_new {
            self.state_slots
                .insert(slot_key, std::sync::Mutex::new(program.default_state()));
            self.requests.note_slot_created(req_id, self.request_timeout);
        }

        let decoded_params = program.decode_params(&params)?;

        let outgoing = {
            // The insert above guarantees a present entry; nothing
            // between there and here can remove it.
            #[allow(clippy::expect_used)]
            let slot_ref = self
                .state_slots
                .get(&slot_key)
                .expect("slot was just inserted or already present");
            let mut node = node_cell
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut state = slot_ref
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            program.run(&req_clock, &mut node, target, decoded_params.as_ref(), state.as_mut())
        };

        // An empty result means this node's program is still waiting
        // on further input under this request (the fan-in case); any
        // output means this hop is done with its own state.
        if outgoing.is_empty() {
            return Ok(());
        }
        self.state_slots.remove(&slot_key);
        self.requests.note_slot_dropped(req_id);

        for (next_target, value) in outgoing {
            let next_params = program.encode_params(value.as_ref());
            let next_continuation = NodeProgContinuation {
                prog_type,
                req_id,
                req_clock: req_clock.clone(),
                target: next_target,
                params: next_params,
            };
            self.forward(next_target.loc, &next_continuation).await?;
        }
        Ok(())
    }

    /// Decode a `MIGRATED_NBR_UPDATE` reply and retry its continuation
    /// at the new location it names. This is the sender-side half of
    /// migration handling: the shard that got bounced re-addresses the
    /// continuation itself rather than asking the now-former owner to
    /// forward on its behalf.
    pub async fn handle_migrated_nbr_update_body(&self, body: &[u8]) -> Result<(), WeaveError> {
        let update: MigratedNbrUpdate = weave_proto::parse(body, MsgKind::MigratedNbrUpdate)?;
        self.handle_migrated_nbr_update(update).await
    }

    async fn handle_migrated_nbr_update(&self, update: MigratedNbrUpdate) -> Result<(), WeaveError> {
        let MigratedNbrUpdate {
            new_location,
            continuation,
        } = update;
        let retried = NodeProgContinuation {
            target: RemoteNode::new(new_location, continuation.target.handle),
            ..continuation
        };
        self.forward(new_location, &retried).await
    }

    async fn forward(
        &self,
        loc: ShardId,
        continuation: &NodeProgContinuation,
    ) -> Result<(), WeaveError> {
        let body = weave_proto::prepare(MsgKind::NodeProg, continuation);
        self.transport
            .send(Location(loc), Bytes::from(body))
            .await?;
        Ok(())
    }
}

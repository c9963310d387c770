// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Async façade over a coordinator's client-facing node-program
//! protocol: pack one `ClientNodeProgReq`, correlate its eventual
//! `ClientNodeProgReply` by a locally chosen tag (the `req_id` itself
//! is the coordinator's to assign, and isn't known until the reply
//! arrives), and hand the caller back a decoded result.
//!
//! Request/reply correlation uses a `oneshot` channel registered in a
//! pending-requests map keyed by that tag, populated before the
//! request is sent and resolved by a background read loop — the same
//! per-connection-outbox shape as the teacher's session hub, mirrored
//! on the client side.

mod error;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use weave_codec::Packable;
use weave_graph::RemoteNode;
use weave_proto::MsgKind;
use weave_runtime::{ClientCancelReq, ClientNodeProgReply, ClientNodeProgReq, ProgramType};
use weave_transport::{Location, LoopbackNetwork, Transport};

pub use error::ClientError;

/// Inbound queue depth for a client's own endpoint, used by
/// [`WeaveClient::connect`]. Clients only ever expect one reply per
/// request in flight, so this just needs to absorb bursts.
const DEFAULT_INBOUND_CAPACITY: usize = 256;

type PendingMap = Arc<DashMap<u64, tokio::sync::oneshot::Sender<Vec<u8>>>>;
type WaitMap = Arc<DashMap<u64, tokio::sync::oneshot::Receiver<Vec<u8>>>>;

/// A connection to one coordinator endpoint. Cheap to clone: the
/// transport, pending-request map, and read loop are all shared.
pub struct WeaveClient<T: Transport> {
    transport: Arc<T>,
    coord: Location,
    next_tag: Arc<AtomicU64>,
    pending: PendingMap,
    waiting: WaitMap,
    /// Tags the caller abandoned via [`Self::cancel`], so a dropped
    /// sender can be told apart from a genuine transport shutdown.
    cancelled: Arc<DashSet<u64>>,
    reader: Arc<tokio::task::JoinHandle<()>>,
}

impl<T: Transport> Clone for WeaveClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            coord: self.coord,
            next_tag: self.next_tag.clone(),
            pending: self.pending.clone(),
            waiting: self.waiting.clone(),
            cancelled: self.cancelled.clone(),
            reader: self.reader.clone(),
        }
    }
}

impl<T: Transport + 'static> WeaveClient<T> {
    /// Wrap an already-connected transport, talking to a coordinator at
    /// `coord`. Spawns the background read loop that correlates
    /// replies to pending requests.
    #[must_use]
    pub fn new(transport: T, coord: Location) -> Self {
        let transport = Arc::new(transport);
        let pending: PendingMap = Arc::new(DashMap::new());
        let waiting: WaitMap = Arc::new(DashMap::new());
        let cancelled = Arc::new(DashSet::new());
        let reader = {
            let transport = transport.clone();
            let pending = pending.clone();
            tokio::spawn(async move {
                loop {
                    let Some((_from, bytes)) = transport.recv().await else {
                        break;
                    };
                    match weave_proto::parse::<ClientNodeProgReply>(&bytes, MsgKind::ClientNodeProgReply) {
                        Ok(reply) => {
                            if let Some((_, tx)) = pending.remove(&reply.client_tag) {
                                let _ = tx.send(reply.result);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping malformed coordinator reply");
                        }
                    }
                }
                // Transport shut down: every caller still waiting would
                // otherwise hang forever. Dropping their senders wakes
                // each receiver with a `RecvError`, which `wait` maps to
                // `TransportDown`.
                pending.clear();
            })
        };
        Self {
            transport,
            coord,
            next_tag: Arc::new(AtomicU64::new(0)),
            pending,
            waiting,
            cancelled,
            reader: Arc::new(reader),
        }
    }

    /// Send `starts` (each starting node's handle plus that program's
    /// own hop-0 parameter encoding) to the coordinator as a new
    /// request, without waiting for its reply. Returns the tag this
    /// client chose to correlate that eventual reply — pass it to
    /// [`Self::await_reply`] or [`Self::cancel`].
    pub async fn submit(
        &self,
        prog_type: ProgramType,
        starts: Vec<(RemoteNode, Vec<u8>)>,
    ) -> Result<u64, ClientError> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.insert(tag, tx);
        self.waiting.insert(tag, rx);

        let req = ClientNodeProgReq {
            client_tag: tag,
            prog_type,
            starts,
        };
        let body = weave_proto::prepare(MsgKind::ClientNodeProgReq, &req);
        if let Err(err) = self.transport.send(self.coord, Bytes::from(body)).await {
            self.pending.remove(&tag);
            self.waiting.remove(&tag);
            return Err(err.into());
        }
        Ok(tag)
    }

    /// Wait up to `timeout` for `tag`'s terminal reply, decoded as `R`.
    /// Consumes the wait registered by [`Self::submit`] — call this at
    /// most once per tag.
    pub async fn await_reply<R: Packable>(&self, tag: u64, timeout: Duration) -> Result<R, ClientError> {
        let Some((_, rx)) = self.waiting.remove(&tag) else {
            // Nothing was ever submitted under this tag, or it was
            // already awaited — there is no reply left to wait for.
            return Err(ClientError::Cancelled);
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result_bytes)) => Ok(R::from_bytes(&result_bytes)?),
            Ok(Err(_recv_error)) => {
                if self.cancelled.remove(&tag).is_some() {
                    Err(ClientError::Cancelled)
                } else {
                    // The sender was dropped without sending: the read
                    // loop saw its transport close.
                    Err(ClientError::TransportDown)
                }
            }
            Err(_elapsed) => {
                self.pending.remove(&tag);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Abandon a request submitted under `tag`. Drops this client's own
    /// record of it immediately (any in-flight [`Self::await_reply`]
    /// call resolves to [`ClientError::Cancelled`]) and best-effort
    /// notifies the coordinator so shard-side state is freed promptly;
    /// per [`crate`]'s cancellation contract, no reply is guaranteed
    /// after this call.
    pub fn cancel(&self, tag: u64) {
        self.cancelled.insert(tag);
        self.pending.remove(&tag);
        let body = weave_proto::prepare(MsgKind::ClientCancelReq, &ClientCancelReq { client_tag: tag });
        let transport = self.transport.clone();
        let coord = self.coord;
        tokio::spawn(async move {
            if let Err(err) = transport.send(coord, Bytes::from(body)).await {
                tracing::warn!(error = %err, "failed to notify coordinator of a cancelled request");
            }
        });
    }

    /// Run a node program: send `starts` to the coordinator and wait up
    /// to `timeout` for its single terminal reply, decoded as `R`. A
    /// convenience wrapper over [`Self::submit`] followed by
    /// [`Self::await_reply`].
    pub async fn run_node_program<R: Packable>(
        &self,
        prog_type: ProgramType,
        starts: Vec<(RemoteNode, Vec<u8>)>,
        timeout: Duration,
    ) -> Result<R, ClientError> {
        let tag = self.submit(prog_type, starts).await?;
        self.await_reply(tag, timeout).await
    }

    /// This client's coordinator endpoint.
    #[must_use]
    pub fn coordinator(&self) -> Location {
        self.coord
    }
}

impl WeaveClient<weave_transport::LoopbackTransport> {
    /// Convenience constructor for the in-process topology: mint a
    /// fresh endpoint at `at` on `net` and connect it to the
    /// coordinator at `coord`.
    #[must_use]
    pub fn connect(net: &LoopbackNetwork, at: Location, coord: Location) -> Self {
        Self::new(net.endpoint(at, DEFAULT_INBOUND_CAPACITY), coord)
    }
}

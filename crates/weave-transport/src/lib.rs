// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reliable, in-order, point-to-point byte delivery between shard
//! endpoints. [`Transport`] is the contract a shard runtime depends on;
//! [`LoopbackTransport`] is an in-process, channel-backed implementation
//! that gives tests and the single-process demo topology a real,
//! runnable transport without sockets.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque endpoint identity: a host+port pair in a real deployment, a
/// small integer for the loopback network used in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(pub u32);

/// Errors a transport implementation may surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The named peer is not reachable (never registered, or its
    /// receiver has been dropped).
    #[error("peer {0:?} unreachable")]
    PeerDown(Location),
}

/// Byte-level delivery between shard endpoints. Implementations must
/// preserve per-sender ordering and report an unreachable peer rather
/// than silently dropping a message.
pub trait Transport: Send + Sync {
    /// This transport's own endpoint identity.
    fn local_endpoint(&self) -> Location;

    /// Enqueue `bytes` for delivery to `to`. Backpressure is expressed
    /// by this future not resolving until the peer's inbound queue has
    /// room; a full queue is not an error, an unreachable peer is.
    fn send(&self, to: Location, bytes: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Await the next inbound message, tagged with the sender's
    /// endpoint. Resolves to `None` once no more messages will ever
    /// arrive (the transport has been shut down).
    fn recv(&self) -> impl Future<Output = Option<(Location, Bytes)>> + Send;
}

type PeerMap = Arc<Mutex<HashMap<Location, mpsc::Sender<(Location, Bytes)>>>>;

/// A shared in-process network: a registry of endpoint mailboxes. Every
/// [`LoopbackTransport`] minted from the same network can reach every
/// other one by [`Location`].
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    peers: PeerMap,
}

impl LoopbackNetwork {
    /// An empty network with no registered endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new endpoint at `at` with an inbound queue of
    /// `capacity` (the deployment's `backpressure_highwater`).
    pub fn endpoint(&self, at: Location, capacity: usize) -> LoopbackTransport {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.peers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(at, tx);
        LoopbackTransport {
            local: at,
            peers: self.peers.clone(),
            inbound: tokio::sync::Mutex::new(rx),
        }
    }
}

/// An endpoint on a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    local: Location,
    peers: PeerMap,
    inbound: tokio::sync::Mutex<mpsc::Receiver<(Location, Bytes)>>,
}

impl Transport for LoopbackTransport {
    fn local_endpoint(&self) -> Location {
        self.local
    }

    async fn send(&self, to: Location, bytes: Bytes) -> Result<(), TransportError> {
        let sender = {
            let guard = self.peers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.get(&to).cloned()
        };
        let sender = sender.ok_or(TransportError::PeerDown(to))?;
        sender
            .send((self.local, bytes))
            .await
            .map_err(|_| TransportError::PeerDown(to))
    }

    async fn recv(&self) -> Option<(Location, Bytes)> {
        self.inbound.lock().await.recv().await
    }
}

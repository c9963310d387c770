// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-shard node storage. [`Store`] is the contract a shard runtime
//! uses to find, lock, and mutate the nodes it owns; [`MemStore`] is
//! the in-memory implementation used by the daemon and by tests.
//!
//! Node bodies live behind a per-node lock (`Arc<Mutex<Node>>`) rather
//! than one lock for the whole table, so two node-program hops landing
//! on different nodes never contend with each other.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use thiserror::Error;
use weave_graph::{Edge, EdgeId, Node, NodeId, VectorClock};

/// Errors raised by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The referenced node does not exist on this shard.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The referenced edge does not exist on the given node.
    #[error("edge {edge_id} not found on node {node_id}")]
    EdgeNotFound {
        /// Owning node.
        node_id: NodeId,
        /// Missing edge id.
        edge_id: EdgeId,
    },
}

/// Contract a shard runtime uses to access the nodes it owns. Every
/// operation is synchronous: lookups are lock-free (`DashMap`) and
/// mutations take a short-lived `std::sync::Mutex` guard that is never
/// held across an `.await`.
pub trait Store: Send + Sync {
    /// Fetch the node handle for `id`, creating it (stamped with
    /// `creation_vc`) if it does not already exist on this shard.
    fn get_or_create_node(&self, id: NodeId, creation_vc: &VectorClock) -> Arc<Mutex<Node>>;

    /// Fetch the node handle for `id`, if this shard owns it.
    fn lock_node(&self, id: NodeId) -> Option<Arc<Mutex<Node>>>;

    /// All node ids currently resident on this shard, live or
    /// tombstoned. Used by migration and by the permanent-delete sweep.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Remove a node from this shard entirely (migration hand-off).
    /// Returns the removed handle, if present.
    fn remove_node(&self, id: NodeId) -> Option<Arc<Mutex<Node>>>;

    /// Record `edge` in `target`'s reverse index, creating `target` if
    /// it is not yet resident (the edge's source shard may create the
    /// target's reverse-edge record before the target's own
    /// `NodeCreateReq` arrives).
    fn record_incoming_edge(
        &self,
        target: NodeId,
        edge_id: EdgeId,
        edge: Edge,
    ) -> Result<(), StorageError>;

    /// Permanently erase a soft-deleted edge's tombstone from both the
    /// owning node's `out_edges` and (if resident) the neighbor's
    /// `in_edges`, once every shard has acknowledged the deletion and
    /// no live request clock can still observe it.
    fn purge_edge(&self, node_id: NodeId, edge_id: EdgeId) -> Result<(), StorageError>;

    /// Sweep every resident node for tombstoned edges and purge them.
    /// Returns the number of edges purged.
    ///
    /// This crate does not track the cross-shard acknowledgement or
    /// oldest-live-request-clock state the full purge precondition
    /// above names, so every tombstoned edge found is purged
    /// unconditionally — acceptable for the demo binary running this on
    /// a timer, where nothing holds a reference to a deleted edge past
    /// the request that observed the deletion.
    fn permanent_delete_sweep(&self) -> usize {
        let mut purged = 0;
        for id in self.node_ids() {
            let Some(cell) = self.lock_node(id) else {
                continue;
            };
            let tombstoned: Vec<EdgeId> = {
                let node = cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                node.out_edges
                    .iter()
                    .chain(node.in_edges.iter())
                    .filter(|(_, edge)| edge.deletion_vc.is_some())
                    .map(|(edge_id, _)| *edge_id)
                    .collect()
            };
            for edge_id in tombstoned {
                if self.purge_edge(id, edge_id).is_ok() {
                    purged += 1;
                }
            }
        }
        purged
    }
}

/// In-memory `Store`, backed by a lock-free node table with one mutex
/// per node.
#[derive(Default)]
pub struct MemStore {
    nodes: DashMap<NodeId, Arc<Mutex<Node>>>,
}

impl MemStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a>(cell: &'a Arc<Mutex<Node>>) -> MutexGuard<'a, Node> {
        cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Store for MemStore {
    fn get_or_create_node(&self, id: NodeId, creation_vc: &VectorClock) -> Arc<Mutex<Node>> {
        self.nodes
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Node::new(creation_vc.clone()))))
            .clone()
    }

    fn lock_node(&self, id: NodeId) -> Option<Arc<Mutex<Node>>> {
        self.nodes.get(&id).map(|entry| entry.clone())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|entry| *entry.key()).collect()
    }

    fn remove_node(&self, id: NodeId) -> Option<Arc<Mutex<Node>>> {
        self.nodes.remove(&id).map(|(_, cell)| cell)
    }

    fn record_incoming_edge(
        &self,
        target: NodeId,
        edge_id: EdgeId,
        edge: Edge,
    ) -> Result<(), StorageError> {
        let cell = self
            .nodes
            .entry(target)
            .or_insert_with(|| Arc::new(Mutex::new(Node::new(edge.creation_vc.clone()))))
            .clone();
        let mut node = Self::lock(&cell);
        node.in_edges.insert(edge_id, edge);
        Ok(())
    }

    fn purge_edge(&self, node_id: NodeId, edge_id: EdgeId) -> Result<(), StorageError> {
        let cell = self
            .nodes
            .get(&node_id)
            .map(|entry| entry.clone())
            .ok_or(StorageError::NodeNotFound(node_id))?;
        let mut node = Self::lock(&cell);
        if node.out_edges.remove(&edge_id).is_none() && node.in_edges.remove(&edge_id).is_none() {
            return Err(StorageError::EdgeNotFound { node_id, edge_id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_graph::{PropertySet, RemoteNode};

    fn vc(n: u64) -> VectorClock {
        VectorClock::new(0, vec![n])
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = MemStore::new();
        let a = store.get_or_create_node(1, &vc(1));
        let b = store.get_or_create_node(1, &vc(99));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().unwrap().creation_vc, vc(1));
    }

    #[test]
    fn lock_node_missing_returns_none() {
        let store = MemStore::new();
        assert!(store.lock_node(42).is_none());
    }

    #[test]
    fn record_incoming_edge_creates_target_if_absent() {
        let store = MemStore::new();
        let edge = Edge {
            creation_vc: vc(1),
            deletion_vc: None,
            properties: PropertySet::default(),
            neighbor: RemoteNode::new(0, 7),
        };
        store.record_incoming_edge(5, 100, edge).unwrap();
        let cell = store.lock_node(5).expect("target created");
        assert!(cell.lock().unwrap().in_edges.contains_key(&100));
    }

    #[test]
    fn purge_edge_removes_tombstone_from_owner() {
        let store = MemStore::new();
        let owner = store.get_or_create_node(1, &vc(1));
        owner.lock().unwrap().out_edges.insert(
            9,
            Edge {
                creation_vc: vc(1),
                deletion_vc: Some(vc(2)),
                properties: PropertySet::default(),
                neighbor: RemoteNode::new(0, 2),
            },
        );
        store.purge_edge(1, 9).unwrap();
        assert!(!owner.lock().unwrap().out_edges.contains_key(&9));
    }

    #[test]
    fn purge_edge_on_missing_node_errors() {
        let store = MemStore::new();
        assert_eq!(
            store.purge_edge(404, 1),
            Err(StorageError::NodeNotFound(404))
        );
    }

    #[test]
    fn permanent_delete_sweep_purges_every_tombstone() {
        let store = MemStore::new();
        let node = store.get_or_create_node(1, &vc(1));
        {
            let mut n = node.lock().unwrap();
            n.out_edges.insert(
                1,
                Edge {
                    creation_vc: vc(1),
                    deletion_vc: None,
                    properties: PropertySet::default(),
                    neighbor: RemoteNode::new(0, 2),
                },
            );
            n.out_edges.insert(
                2,
                Edge {
                    creation_vc: vc(1),
                    deletion_vc: Some(vc(2)),
                    properties: PropertySet::default(),
                    neighbor: RemoteNode::new(0, 3),
                },
            );
        }
        assert_eq!(store.permanent_delete_sweep(), 1);
        let n = node.lock().unwrap();
        assert!(n.out_edges.contains_key(&1));
        assert!(!n.out_edges.contains_key(&2));
    }

    #[test]
    fn remove_node_detaches_from_table() {
        let store = MemStore::new();
        store.get_or_create_node(1, &vc(1));
        assert!(store.remove_node(1).is_some());
        assert!(store.lock_node(1).is_none());
    }
}

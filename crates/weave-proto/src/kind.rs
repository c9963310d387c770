// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Message kind tags, grouped by family in ABI-stable order. New kinds
//! are appended to the end of the enum; existing discriminants never
//! change or get reused.

/// Discriminant for every message shape the cluster exchanges, across
/// all three traffic families: client-to-coordinator, coordinator-to-
/// client, and shard-to-shard (including migration control).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MsgKind {
    // --- client -> coordinator ---
    /// Client asks the coordinator to create a node at a given handle.
    ClientNodeCreateReq = 0,
    /// Client asks the coordinator to create an edge between two nodes.
    ClientEdgeCreateReq,
    /// Client asks the coordinator to soft-delete a node.
    ClientNodeDeleteReq,
    /// Client asks the coordinator to soft-delete an edge.
    ClientEdgeDeleteReq,
    /// Client asks the coordinator to attach a property to an edge.
    ClientAddEdgeProp,
    /// Client asks the coordinator to remove a property from an edge.
    ClientDelEdgeProp,
    /// Client asks the coordinator to run an arbitrary registered
    /// program by name, outside the typed `ClientNodeProgReq` path.
    ClientRunProgramReq,
    /// Client asks whether one node can reach another.
    ClientReachableReq,
    /// Client asks for a shortest-path (Dijkstra) query.
    ClientDijkstraReq,
    /// Client asks for a clustering-coefficient query.
    ClientClusteringReq,

    // --- coordinator -> client ---
    /// Coordinator's reply to any of the client-facing requests above.
    ClientReply,

    // --- shard -> shard ---
    /// Create a node locally on the receiving shard.
    NodeCreateReq,
    /// Create an edge whose source node lives on the receiving shard.
    EdgeCreateReq,
    /// Forward an edge-create request to the shard owning its source.
    TransitEdgeCreateReq,
    /// Ask the neighbor's shard to record the reverse (incoming) half
    /// of an edge this shard just created.
    ReverseEdgeCreate,
    /// Forward a reverse-edge-create request to the shard owning the
    /// neighbor.
    TransitReverseEdgeCreate,
    /// Acknowledge a completed `NodeCreateReq`.
    NodeCreateAck,
    /// Acknowledge a completed `EdgeCreateReq`.
    EdgeCreateAck,
    /// Acknowledge a completed `TransitEdgeCreateReq`.
    TransitEdgeCreateAck,
    /// Soft-delete a node locally on the receiving shard.
    NodeDeleteReq,
    /// Forward a node-delete request to the shard owning the node.
    TransitNodeDeleteReq,
    /// Soft-delete an edge locally on the receiving shard.
    EdgeDeleteReq,
    /// Forward an edge-delete request to the shard owning the edge.
    TransitEdgeDeleteReq,
    /// Reclaim a soft-deleted edge's tombstone permanently.
    PermanentDeleteEdge,
    /// Acknowledge a completed `PermanentDeleteEdge`.
    PermanentDeleteEdgeAck,
    /// Acknowledge a completed `NodeDeleteReq`.
    NodeDeleteAck,
    /// Acknowledge a completed `EdgeDeleteReq`.
    EdgeDeleteAck,
    /// Attach a property to an edge locally on the receiving shard.
    EdgeAddProp,
    /// Forward an edge-property-add request to the shard owning the edge.
    TransitEdgeAddProp,
    /// Remove a property from an edge locally on the receiving shard.
    EdgeDeleteProp,
    /// Forward an edge-property-delete request to the shard owning the
    /// edge.
    TransitEdgeDeleteProp,
    /// Acknowledge a completed `EdgeDeleteProp`.
    EdgeDeletePropAck,
    /// Push a cached value (e.g. a migrated node's new location) to a
    /// peer shard.
    CacheUpdate,
    /// Acknowledge a completed `CacheUpdate`.
    CacheUpdateAck,
    /// Ask a shard to refresh its cached view of a node.
    NodeRefreshReq,
    /// Reply to a `NodeRefreshReq`.
    NodeRefreshReply,
    /// Tell a neighbor shard that a node it references has migrated to
    /// a new location.
    MigratedNbrUpdate,
    /// Deliver one node-program continuation to its target node.
    NodeProg,

    // --- migration control ---
    /// First step of the (unimplemented) node migration protocol.
    MigrateNodeStep1,
    /// Fourth step of the (unimplemented) node migration protocol.
    MigrateNodeStep4,
    /// Sixth step of the (unimplemented) node migration protocol.
    MigrateNodeStep6,
    /// Coordinator-initiated request to migrate a node.
    CoordNodeMigrate,
    /// Acknowledge a completed `CoordNodeMigrate`.
    CoordNodeMigrateAck,

    // --- client-facing node-program result ---
    /// Client-to-coordinator: run a registered node program starting
    /// from a set of nodes.
    ClientNodeProgReq,
    /// Coordinator-to-client: the terminal result of a `ClientNodeProgReq`.
    ClientNodeProgReply,

    /// Carries a `String` describing a fatal protocol or runtime error.
    Error,

    /// Client-to-coordinator: abandon a previously issued node-program
    /// request. Carries only the client's own correlation tag, since a
    /// client never learns the `req_id` the coordinator assigned.
    ClientCancelReq,
    /// Coordinator-to-shard: drop all local state for `req_id`.
    CancelNodeProg,
}

impl MsgKind {
    /// All discriminants, in declaration order. Kept in lockstep with
    /// the enum by the `kind_order_matches_all_variants` test below.
    const ALL: &'static [MsgKind] = &[
        MsgKind::ClientNodeCreateReq,
        MsgKind::ClientEdgeCreateReq,
        MsgKind::ClientNodeDeleteReq,
        MsgKind::ClientEdgeDeleteReq,
        MsgKind::ClientAddEdgeProp,
        MsgKind::ClientDelEdgeProp,
        MsgKind::ClientRunProgramReq,
        MsgKind::ClientReachableReq,
        MsgKind::ClientDijkstraReq,
        MsgKind::ClientClusteringReq,
        MsgKind::ClientReply,
        MsgKind::NodeCreateReq,
        MsgKind::EdgeCreateReq,
        MsgKind::TransitEdgeCreateReq,
        MsgKind::ReverseEdgeCreate,
        MsgKind::TransitReverseEdgeCreate,
        MsgKind::NodeCreateAck,
        MsgKind::EdgeCreateAck,
        MsgKind::TransitEdgeCreateAck,
        MsgKind::NodeDeleteReq,
        MsgKind::TransitNodeDeleteReq,
        MsgKind::EdgeDeleteReq,
        MsgKind::TransitEdgeDeleteReq,
        MsgKind::PermanentDeleteEdge,
        MsgKind::PermanentDeleteEdgeAck,
        MsgKind::NodeDeleteAck,
        MsgKind::EdgeDeleteAck,
        MsgKind::EdgeAddProp,
        MsgKind::TransitEdgeAddProp,
        MsgKind::EdgeDeleteProp,
        MsgKind::TransitEdgeDeleteProp,
        MsgKind::EdgeDeletePropAck,
        MsgKind::CacheUpdate,
        MsgKind::CacheUpdateAck,
        MsgKind::NodeRefreshReq,
        MsgKind::NodeRefreshReply,
        MsgKind::MigratedNbrUpdate,
        MsgKind::NodeProg,
        MsgKind::MigrateNodeStep1,
        MsgKind::MigrateNodeStep4,
        MsgKind::MigrateNodeStep6,
        MsgKind::CoordNodeMigrate,
        MsgKind::CoordNodeMigrateAck,
        MsgKind::ClientNodeProgReq,
        MsgKind::ClientNodeProgReply,
        MsgKind::Error,
        MsgKind::ClientCancelReq,
        MsgKind::CancelNodeProg,
    ];

    /// Recover a `MsgKind` from its wire discriminant. Returns `None`
    /// for tags this build does not recognize (e.g. sent by a newer
    /// peer) rather than panicking.
    #[must_use]
    pub fn from_u32(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| *k as u32 == tag)
    }
}

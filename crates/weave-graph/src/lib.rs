// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Versioned property-graph entities shared by every shard: nodes,
//! edges, remote-node handles, and the vector-clock visibility
//! predicate that decides what a running request can see.

mod entities;
mod vclock;
mod visibility;

pub use entities::{
    multiset_eq, Edge, EdgeId, Node, NodeId, Property, PropertySet, PropertyValue, RemoteNode,
};
pub use vclock::{compare, total_order, ClockOrder, ShardId, VectorClock};
pub use visibility::visible;

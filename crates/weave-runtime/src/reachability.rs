// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Depth-bounded reachability, grounded on
//! `node_prog/reachable_program.h`'s broadcast traversal: each hop
//! either is the destination, has no further unvisited-by-this-branch
//! neighbors, or forwards to every visible neighbor one hop deeper.
//! Every branch reports its own outcome directly to `report_to`
//! (typically the requesting coordinator) rather than folding through
//! a shared aggregator, since a single hit is sufficient to answer
//! "is it reachable" and the coordinator only needs the first `true`.

use std::any::Any;

use weave_codec::{Cursor, Packable, Result as CodecResult};
use weave_graph::{Node, RemoteNode, VectorClock};

use crate::program::{NodeProgram, ProgramType};

/// Parameters carried by a reachability continuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachabilityParams {
    /// Node the program is trying to reach.
    pub dest: RemoteNode,
    /// Where to send this branch's final outcome.
    pub report_to: RemoteNode,
    /// Hops taken so far.
    pub hops: u64,
    /// Hard depth bound; a branch that exhausts it reports a miss
    /// rather than traversing forever.
    pub max_hops: u64,
}

impl Packable for ReachabilityParams {
    fn size(&self) -> usize {
        self.dest.size() + self.report_to.size() + self.hops.size() + self.max_hops.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.dest.pack(buf);
        self.report_to.pack(buf);
        self.hops.pack(buf);
        self.max_hops.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            dest: RemoteNode::unpack(cur)?,
            report_to: RemoteNode::unpack(cur)?,
            hops: u64::unpack(cur)?,
            max_hops: u64::unpack(cur)?,
        })
    }
}

/// Terminal outcome of one branch, delivered to `report_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityResult {
    /// Whether this branch reached `dest`.
    pub reachable: bool,
    /// Hops taken (meaningful only when `reachable`).
    pub hops: u64,
}

impl Packable for ReachabilityResult {
    fn size(&self) -> usize {
        self.reachable.size() + self.hops.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.reachable.pack(buf);
        self.hops.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            reachable: bool::unpack(cur)?,
            hops: u64::unpack(cur)?,
        })
    }
}

/// See module docs.
pub struct ReachabilityProgram;

impl NodeProgram for ReachabilityProgram {
    fn prog_type(&self) -> ProgramType {
        ProgramType::Reachability
    }

    fn decode_params(&self, bytes: &[u8]) -> CodecResult<Box<dyn Any + Send>> {
        Ok(Box::new(ReachabilityParams::from_bytes(bytes)?))
    }

    fn encode_params(&self, value: &(dyn Any + Send)) -> Vec<u8> {
        if let Some(p) = value.downcast_ref::<ReachabilityParams>() {
            p.to_bytes()
        } else if let Some(r) = value.downcast_ref::<ReachabilityResult>() {
            r.to_bytes()
        } else {
            Vec::new()
        }
    }

    fn default_state(&self) -> Box<dyn Any + Send> {
        Box::new(())
    }

    fn run(
        &self,
        req_clock: &VectorClock,
        node: &mut Node,
        self_handle: RemoteNode,
        params: &(dyn Any + Send),
        _state: &mut (dyn Any + Send),
    ) -> Vec<(RemoteNode, Box<dyn Any + Send>)> {
        let Some(params) = params.downcast_ref::<ReachabilityParams>() else {
            return Vec::new();
        };

        // Compared by handle, not the full `RemoteNode` (loc included):
        // a node's identity is its handle, and `loc` is only ever a
        // locator hint that migration can leave stale mid-traversal.
        if self_handle.handle == params.dest.handle {
            return vec![(
                params.report_to,
                Box::new(ReachabilityResult {
                    reachable: true,
                    hops: params.hops,
                }),
            )];
        }

        if params.hops >= params.max_hops {
            return vec![(
                params.report_to,
                Box::new(ReachabilityResult {
                    reachable: false,
                    hops: params.hops,
                }),
            )];
        }

        let neighbors: Vec<RemoteNode> = node.visible_out_edges(req_clock).map(|e| e.neighbor).collect();
        if neighbors.is_empty() {
            return vec![(
                params.report_to,
                Box::new(ReachabilityResult {
                    reachable: false,
                    hops: params.hops,
                }),
            )];
        }

        neighbors
            .into_iter()
            .map(|nbr| {
                let next = ReachabilityParams {
                    dest: params.dest,
                    report_to: params.report_to,
                    hops: params.hops + 1,
                    max_hops: params.max_hops,
                };
                (nbr, Box::new(next) as Box<dyn Any + Send>)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_graph::{Edge, PropertySet};

    fn vc(n: u64) -> VectorClock {
        VectorClock::new(0, vec![n])
    }

    #[test]
    fn reaching_self_reports_success() {
        let program = ReachabilityProgram;
        let dest = RemoteNode::new(1, 3);
        let report_to = RemoteNode::new(99, 0);
        let params = ReachabilityParams {
            dest,
            report_to,
            hops: 2,
            max_hops: 10,
        };
        let mut node = Node::new(vc(1));
        let mut state = program.default_state();
        let out = program.run(&vc(1), &mut node, dest, &params, state.as_mut());
        assert_eq!(out.len(), 1);
        let result = out[0].1.downcast_ref::<ReachabilityResult>().unwrap();
        assert_eq!(out[0].0, report_to);
        assert_eq!(*result, ReachabilityResult { reachable: true, hops: 2 });
    }

    #[test]
    fn dead_end_reports_failure() {
        let program = ReachabilityProgram;
        let dest = RemoteNode::new(1, 999);
        let report_to = RemoteNode::new(99, 0);
        let params = ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        };
        let mut node = Node::new(vc(1));
        let mut state = program.default_state();
        let out = program.run(&vc(1), &mut node, RemoteNode::new(1, 1), &params, state.as_mut());
        assert_eq!(out.len(), 1);
        let result = out[0].1.downcast_ref::<ReachabilityResult>().unwrap();
        assert!(!result.reachable);
    }

    #[test]
    fn live_neighbor_forwards_one_hop_deeper() {
        let program = ReachabilityProgram;
        let dest = RemoteNode::new(1, 999);
        let report_to = RemoteNode::new(99, 0);
        let params = ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        };
        let mut node = Node::new(vc(1));
        node.out_edges.insert(
            1,
            Edge {
                creation_vc: vc(1),
                deletion_vc: None,
                properties: PropertySet::default(),
                neighbor: RemoteNode::new(1, 2),
            },
        );
        let mut state = program.default_state();
        let out = program.run(&vc(1), &mut node, RemoteNode::new(1, 1), &params, state.as_mut());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, RemoteNode::new(1, 2));
        let next = out[0].1.downcast_ref::<ReachabilityParams>().unwrap();
        assert_eq!(next.hops, 1);
    }

    #[test]
    fn tombstoned_neighbor_is_not_visible() {
        let program = ReachabilityProgram;
        let dest = RemoteNode::new(1, 999);
        let report_to = RemoteNode::new(99, 0);
        let params = ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        };
        let mut node = Node::new(vc(1));
        node.out_edges.insert(
            1,
            Edge {
                creation_vc: vc(1),
                deletion_vc: Some(vc(2)),
                properties: PropertySet::default(),
                neighbor: RemoteNode::new(1, 2),
            },
        );
        let mut state = program.default_state();
        let out = program.run(&vc(3), &mut node, RemoteNode::new(1, 1), &params, state.as_mut());
        let result = out[0].1.downcast_ref::<ReachabilityResult>().unwrap();
        assert!(!result.reachable);
    }

    #[test]
    fn hop_limit_forces_a_miss() {
        let program = ReachabilityProgram;
        let dest = RemoteNode::new(1, 999);
        let report_to = RemoteNode::new(99, 0);
        let params = ReachabilityParams {
            dest,
            report_to,
            hops: 5,
            max_hops: 5,
        };
        let mut node = Node::new(vc(1));
        node.out_edges.insert(
            1,
            Edge {
                creation_vc: vc(1),
                deletion_vc: None,
                properties: PropertySet::default(),
                neighbor: RemoteNode::new(1, 2),
            },
        );
        let mut state = program.default_state();
        let out = program.run(&vc(1), &mut node, RemoteNode::new(1, 1), &params, state.as_mut());
        let result = out[0].1.downcast_ref::<ReachabilityResult>().unwrap();
        assert!(!result.reachable);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fan-in edge counting, grounded on the aggregation shape in
//! `node_prog/triangle_program.h`'s `triangle_node_program`, but
//! carrying only the fields the pattern itself needs
//! (`responses_left`, `num_edges`, `returning`, `super_node`,
//! `vts_node`) rather than the incomplete `triangle_params` field list
//! the original interleaves from an unrelated reachability struct.
//!
//! A designated super node's state accumulates one report per starting
//! node; when the coordinator's initial `responses_left` count reaches
//! zero, the super node emits a single continuation carrying the total
//! to `report_to` (the spec's `vts_node`).

use std::any::Any;

use weave_codec::{Cursor, Packable, Result as CodecResult};
use weave_graph::{Node, RemoteNode, VectorClock};

use crate::program::{NodeProgram, ProgramType};

/// Parameters carried by an edge-count continuation. The same shape
/// serves three roles, distinguished by `self_handle` and `returning`
/// at dispatch time: the coordinator's kickoff to the super node
/// (`returning = false`, `expected` set), the coordinator's kickoff to
/// each leaf (`returning` irrelevant), and a leaf's report back to the
/// super node (`returning = true`, `partial` set).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCountParams {
    /// The node aggregating all reports.
    pub super_node: RemoteNode,
    /// Where the super node sends the final total.
    pub report_to: RemoteNode,
    /// Whether this message is a leaf's report back to the super node.
    pub returning: bool,
    /// Number of starting nodes the super node should expect a report
    /// from; meaningful only on the coordinator's kickoff message.
    pub expected: u64,
    /// This leaf's visible outgoing edge count; meaningful only when
    /// `returning`.
    pub partial: u64,
}

impl Packable for EdgeCountParams {
    fn size(&self) -> usize {
        self.super_node.size()
            + self.report_to.size()
            + self.returning.size()
            + self.expected.size()
            + self.partial.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.super_node.pack(buf);
        self.report_to.pack(buf);
        self.returning.pack(buf);
        self.expected.pack(buf);
        self.partial.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            super_node: RemoteNode::unpack(cur)?,
            report_to: RemoteNode::unpack(cur)?,
            returning: bool::unpack(cur)?,
            expected: u64::unpack(cur)?,
            partial: u64::unpack(cur)?,
        })
    }
}

/// The super node's final answer, delivered to `report_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCountResult {
    /// Sum of visible outgoing edges across every starting node.
    pub total: u64,
}

impl Packable for EdgeCountResult {
    fn size(&self) -> usize {
        self.total.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.total.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        Ok(Self {
            total: u64::unpack(cur)?,
        })
    }
}

/// The super node's accumulator. Lives in the program-state slot keyed
/// by `(EdgeCount, req_id, super_node.handle)`.
#[derive(Debug, Default)]
struct EdgeCountState {
    responses_left: u64,
    total: u64,
}

/// See module docs.
pub struct EdgeCountProgram;

impl NodeProgram for EdgeCountProgram {
    fn prog_type(&self) -> ProgramType {
        ProgramType::EdgeCount
    }

    fn decode_params(&self, bytes: &[u8]) -> CodecResult<Box<dyn Any + Send>> {
        Ok(Box::new(EdgeCountParams::from_bytes(bytes)?))
    }

    fn encode_params(&self, value: &(dyn Any + Send)) -> Vec<u8> {
        if let Some(p) = value.downcast_ref::<EdgeCountParams>() {
            p.to_bytes()
        } else if let Some(r) = value.downcast_ref::<EdgeCountResult>() {
            r.to_bytes()
        } else {
            Vec::new()
        }
    }

    fn default_state(&self) -> Box<dyn Any + Send> {
        Box::<EdgeCountState>::default()
    }

    fn run(
        &self,
        req_clock: &VectorClock,
        node: &mut Node,
        self_handle: RemoteNode,
        params: &(dyn Any + Send),
        state: &mut (dyn Any + Send),
    ) -> Vec<(RemoteNode, Box<dyn Any + Send>)> {
        let Some(params) = params.downcast_ref::<EdgeCountParams>() else {
            return Vec::new();
        };

        if self_handle != params.super_node {
            let count = node.visible_out_edges(req_clock).count() as u64;
            let report = EdgeCountParams {
                super_node: params.super_node,
                report_to: params.report_to,
                returning: true,
                expected: 0,
                partial: count,
            };
            return vec![(params.super_node, Box::new(report))];
        }

        // This is the super node. Its state type is paired 1:1 with
        // this program's registry entry, so the slot the dispatch loop
        // hands us always holds an `EdgeCountState`.
        #[allow(clippy::expect_used)]
        let state = state
            .downcast_mut::<EdgeCountState>()
            .expect("edge-count slot always holds EdgeCountState");

        if !params.returning {
            state.responses_left = state.responses_left.saturating_add(params.expected);
            return Vec::new();
        }

        state.total += params.partial;
        state.responses_left = state.responses_left.saturating_sub(1);
        if state.responses_left == 0 {
            return vec![(
                params.report_to,
                Box::new(EdgeCountResult { total: state.total }),
            )];
        }
        Vec::new()
    }
}

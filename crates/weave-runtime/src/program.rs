// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The node-program abstraction and its closed registry.
//!
//! A program type is one entry in [`ProgramRegistry`] — adding one
//! means implementing [`NodeProgram`] and registering it, not touching
//! the dispatch loop. Parameter and state payloads are erased behind
//! `Any` so the loop can route a continuation without knowing which
//! concrete program produced it; each program downcasts its own values
//! back out.

use std::any::Any;
use std::collections::HashMap;

use weave_codec::{CodecError, Cursor, Packable, Result as CodecResult};
use weave_graph::{Node, RemoteNode, VectorClock};

/// Closed set of program kinds a shard can execute. Not an open plugin
/// system — adding a kind is one variant plus one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProgramType {
    /// Depth-bounded traversal toward a destination handle.
    Reachability = 0,
    /// Fan-in count of visible outgoing edges across a node set.
    EdgeCount = 1,
}

impl ProgramType {
    const ALL: [ProgramType; 2] = [ProgramType::Reachability, ProgramType::EdgeCount];

    /// Recover a `ProgramType` from its wire tag.
    #[must_use]
    pub fn from_u32(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| *p as u32 == tag)
    }
}

impl Packable for ProgramType {
    fn size(&self) -> usize {
        (*self as u32).size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        (*self as u32).pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        let tag = u32::unpack(cur)?;
        Self::from_u32(tag).ok_or(CodecError::TypeMismatch {
            expected: "program type tag",
            found_tag: Some(tag),
        })
    }
}

/// One hop of a node program's pure traversal function. Implementors
/// own the encoding of their own parameter and state types; the
/// runtime treats both as opaque beyond `Any` downcasting.
pub trait NodeProgram: Send + Sync {
    /// The tag this program is registered under.
    fn prog_type(&self) -> ProgramType;

    /// Decode wire bytes into this program's parameter type.
    fn decode_params(&self, bytes: &[u8]) -> CodecResult<Box<dyn Any + Send>>;

    /// Encode a value this program produced (either its own parameter
    /// type, for a continuation bound to another hop, or a terminal
    /// result type, for a continuation bound to the coordinator) back
    /// to wire bytes.
    fn encode_params(&self, value: &(dyn Any + Send)) -> Vec<u8>;

    /// A freshly initialized state slot for a node seeing this program
    /// for the first time under a given request id.
    fn default_state(&self) -> Box<dyn Any + Send>;

    /// Execute one hop: observe `node` as of `req_clock`, consult and
    /// possibly mutate this node's state slot, and return the next
    /// continuations to deliver.
    fn run(
        &self,
        req_clock: &VectorClock,
        node: &mut Node,
        self_handle: RemoteNode,
        params: &(dyn Any + Send),
        state: &mut (dyn Any + Send),
    ) -> Vec<(RemoteNode, Box<dyn Any + Send>)>;
}

/// The set of programs a shard can execute, keyed by [`ProgramType`].
#[derive(Default)]
pub struct ProgramRegistry {
    programs: HashMap<ProgramType, Box<dyn NodeProgram>>,
}

impl ProgramRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `program` under its own `prog_type()`, replacing any
    /// program previously registered for that tag.
    pub fn register(&mut self, program: Box<dyn NodeProgram>) {
        self.programs.insert(program.prog_type(), program);
    }

    /// Look up the program registered for `prog_type`, if any.
    #[must_use]
    pub fn get(&self, prog_type: ProgramType) -> Option<&dyn NodeProgram> {
        self.programs.get(&prog_type).map(std::convert::AsRef::as_ref)
    }

    /// A registry pre-populated with the built-in programs
    /// (`ReachabilityProgram`, `EdgeCountProgram`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::reachability::ReachabilityProgram));
        registry.register(Box::new(crate::edge_count::EdgeCountProgram));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_type_roundtrips_through_codec() {
        for p in ProgramType::ALL {
            let bytes = p.to_bytes();
            assert_eq!(ProgramType::from_bytes(&bytes).unwrap(), p);
        }
    }

    #[test]
    fn unknown_program_tag_is_rejected() {
        assert!(ProgramType::from_u32(999).is_none());
    }

    #[test]
    fn builtins_cover_reachability_and_edge_count() {
        let registry = ProgramRegistry::with_builtins();
        assert!(registry.get(ProgramType::Reachability).is_some());
        assert!(registry.get(ProgramType::EdgeCount).is_some());
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node-program dispatch: the registry, built-in programs, and
//! per-shard runtime that execute hop-by-hop traversals across a
//! sharded property graph.

mod cancel;
mod continuation;
mod coordinator;
mod edge_count;
mod error;
mod migration;
mod program;
mod reachability;
mod request_table;
mod shard_runtime;
mod worker_pool;

/// Identifies one client-initiated node-program request across every
/// shard it touches. Assigned by the coordinator that accepts the
/// request; carried unchanged through every continuation.
pub type ReqId = u64;

pub use cancel::{CancelNodeProg, ClientCancelReq};
pub use continuation::NodeProgContinuation;
pub use coordinator::{ClientNodeProgReply, ClientNodeProgReq, Coordinator, CoordinatorPool};
pub use edge_count::{EdgeCountParams, EdgeCountProgram, EdgeCountResult};
pub use error::WeaveError;
pub use migration::MigratedNbrUpdate;
pub use program::{NodeProgram, ProgramRegistry, ProgramType};
pub use reachability::{ReachabilityParams, ReachabilityProgram, ReachabilityResult};
pub use request_table::RequestTable;
pub use shard_runtime::ShardRuntime;
pub use worker_pool::WorkerPool;

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Weave CLI (weave-cli)
//!
//! Like `weave-shardd`, this binary cannot dial a daemon running in
//! another process: [`LoopbackNetwork`] is in-process only. So each
//! invocation stands up its own small cluster, seeds it with a toy
//! graph, runs one node program against it through [`WeaveClient`],
//! prints the answer, and exits. It is a way to exercise the client
//! and program surface from a terminal, not a client for a long-lived
//! `weave-shardd` process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use weave_client::WeaveClient;
use weave_codec::Packable;
use weave_graph::{Edge, PropertySet, RemoteNode, VectorClock};
use weave_runtime::{
    Coordinator, CoordinatorPool, EdgeCountParams, EdgeCountResult, ProgramRegistry,
    ProgramType, ReachabilityParams, ReachabilityResult, ShardRuntime, WorkerPool,
};
use weave_storage::{MemStore, Store};
use weave_transport::{Location, LoopbackNetwork};

const NUM_SHARDS: u32 = 2;
const COORD_ID: u32 = NUM_SHARDS;
const CLIENT_ID: u32 = NUM_SHARDS + 1;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,

    /// Milliseconds to wait for a reply before giving up.
    #[clap(long, default_value_t = 5000, global = true)]
    timeout_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Is `to` reachable from `from` within `max_hops`?
    Reachability {
        /// Starting node id, within the demo graph's shard 0.
        #[clap(long, default_value_t = 0)]
        from: u64,
        /// Destination node id, within the demo graph's shard 1.
        #[clap(long, default_value_t = 2)]
        to: u64,
        #[clap(long, default_value_t = 8)]
        max_hops: u64,
    },
    /// Count visible outgoing edges across every node in the demo
    /// graph, fanned in through a single super node.
    EdgeCount {
        /// Node id the totals are aggregated at (shard 0).
        #[clap(long, default_value_t = 0)]
        super_node: u64,
    },
}

/// A hand-built toy graph spread across two shards: 0 -> 1 -> 2 on
/// shard 0, with node 2 living on shard 1 and a cross-shard edge
/// connecting them.
fn seed_demo_graph(stores: &[Arc<dyn Store>]) {
    let vc = VectorClock::new(0, vec![1, 1]);

    let edge = |neighbor: RemoteNode| Edge {
        creation_vc: vc.clone(),
        deletion_vc: None,
        properties: PropertySet::default(),
        neighbor,
    };

    stores[0].get_or_create_node(0, &vc);
    if let Some(cell) = stores[0].lock_node(0) {
        cell.lock().unwrap().out_edges.insert(1, edge(RemoteNode::new(0, 1)));
    }

    stores[0].get_or_create_node(1, &vc);
    if let Some(cell) = stores[0].lock_node(1) {
        cell.lock().unwrap().out_edges.insert(2, edge(RemoteNode::new(1, 2)));
    }

    stores[1].get_or_create_node(2, &vc);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let timeout = Duration::from_millis(args.timeout_ms);

    let net = LoopbackNetwork::new();
    let mut stores: Vec<Arc<dyn Store>> = Vec::new();
    let mut shard_pools = Vec::new();
    for shard_id in 0..NUM_SHARDS {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let transport = Arc::new(net.endpoint(Location(shard_id), 4096));
        let runtime = Arc::new(ShardRuntime::new(
            shard_id,
            store.clone(),
            transport,
            ProgramRegistry::with_builtins(),
            Duration::from_secs(30),
        ));
        // One worker per shard keeps delivery order equal to send
        // order, which the edge-count fan-in relies on: the super
        // node's kickoff must be processed before either leaf's report.
        shard_pools.push(WorkerPool::spawn(1, runtime));
        stores.push(store);
    }
    seed_demo_graph(&stores);

    let coord_transport = Arc::new(net.endpoint(Location(COORD_ID), 4096));
    let coordinator = Arc::new(Coordinator::new(
        Location(COORD_ID),
        coord_transport,
        NUM_SHARDS as usize,
    ));
    let coord_pool = CoordinatorPool::spawn(1, coordinator);

    let client = WeaveClient::connect(&net, Location(CLIENT_ID), Location(COORD_ID));
    let report_to = RemoteNode::new(COORD_ID, 0);

    match args.cmd {
        Command::Reachability { from, to, max_hops } => {
            let start = RemoteNode::new(0, from);
            let dest = RemoteNode::new(1, to);
            let params = ReachabilityParams { dest, report_to, hops: 0, max_hops };
            let result: ReachabilityResult = client
                .run_node_program(ProgramType::Reachability, vec![(start, params.to_bytes())], timeout)
                .await
                .context("reachability query failed")?;
            if result.reachable {
                println!("reachable in {} hop(s)", result.hops);
            } else {
                println!("not reachable within {max_hops} hop(s)");
            }
        }
        Command::EdgeCount { super_node } => {
            let super_handle = RemoteNode::new(0, super_node);
            let leaves: Vec<u64> = stores[0]
                .node_ids()
                .into_iter()
                .filter(|id| *id != super_node)
                .collect();
            // The super node's kickoff (which arms `responses_left`)
            // must be sent, and processed, before either leaf's report;
            // a single worker per shard makes send order and process
            // order agree, so the kickoff goes first in `starts`.
            let kickoff = EdgeCountParams {
                super_node: super_handle,
                report_to,
                returning: false,
                expected: leaves.len() as u64,
                partial: 0,
            };
            let mut starts: Vec<(RemoteNode, Vec<u8>)> = vec![(super_handle, kickoff.to_bytes())];
            starts.extend(leaves.iter().map(|id| {
                let params = EdgeCountParams {
                    super_node: super_handle,
                    report_to,
                    returning: false,
                    expected: 0,
                    partial: 0,
                };
                (RemoteNode::new(0, *id), params.to_bytes())
            }));

            let result: EdgeCountResult = client
                .run_node_program(ProgramType::EdgeCount, starts, timeout)
                .await
                .context("edge-count query failed")?;
            println!("total visible outgoing edges: {}", result.total);
        }
    }

    coord_pool.shutdown().await;
    for pool in shard_pools {
        pool.shutdown().await;
    }
    Ok(())
}

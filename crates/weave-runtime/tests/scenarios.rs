// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end node-program scenarios driven over a multi-shard
//! `LoopbackTransport` + `MemStore` topology, in-process.

use std::sync::Arc;
use std::time::Duration;

use weave_codec::Packable;
use weave_graph::{Edge, PropertySet, RemoteNode, VectorClock};
use weave_proto::MsgKind;
use weave_runtime::{
    EdgeCountParams, EdgeCountResult, NodeProgContinuation, ProgramRegistry, ProgramType,
    ReachabilityParams, ReachabilityResult, ShardRuntime, WorkerPool,
};
use weave_storage::{MemStore, Store};
use weave_transport::{Location, LoopbackNetwork, LoopbackTransport, Transport};

const COORD: Location = Location(99);
const CLIENT: Location = Location(50);

struct Shard {
    runtime: Arc<ShardRuntime<LoopbackTransport>>,
    store: Arc<MemStore>,
    _pool: WorkerPool,
}

fn spin_up_shard(net: &LoopbackNetwork, shard_id: u32, timeout: Duration) -> Shard {
    let transport = net.endpoint(Location(shard_id), 256);
    let store = Arc::new(MemStore::new());
    let runtime = Arc::new(ShardRuntime::new(
        shard_id,
        store.clone(),
        Arc::new(transport),
        ProgramRegistry::with_builtins(),
        timeout,
    ));
    let pool = WorkerPool::spawn(2, runtime.clone());
    Shard {
        runtime,
        store,
        _pool: pool,
    }
}

fn add_edge(store: &MemStore, owner: u64, edge_id: u64, creation: &VectorClock, neighbor: RemoteNode) {
    let cell = store.get_or_create_node(owner, creation);
    let mut node = cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    node.out_edges.insert(
        edge_id,
        Edge {
            creation_vc: creation.clone(),
            deletion_vc: None,
            properties: PropertySet::default(),
            neighbor,
        },
    );
}

async fn send_continuation(
    client: &LoopbackTransport,
    to: Location,
    continuation: &NodeProgContinuation,
) {
    let body = weave_proto::prepare(MsgKind::NodeProg, continuation);
    client
        .send(to, bytes::Bytes::from(body))
        .await
        .expect("send to a registered endpoint never fails");
}

async fn recv_reachability_result(coord: &LoopbackTransport) -> ReachabilityResult {
    let (_from, bytes) = tokio::time::timeout(Duration::from_secs(2), coord.recv())
        .await
        .expect("reply within deadline")
        .expect("reply delivered");
    let continuation: NodeProgContinuation = weave_proto::parse(&bytes, MsgKind::NodeProg).unwrap();
    ReachabilityResult::from_bytes(&continuation.params).unwrap()
}

async fn recv_edge_count_result(coord: &LoopbackTransport) -> EdgeCountResult {
    let (_from, bytes) = tokio::time::timeout(Duration::from_secs(2), coord.recv())
        .await
        .expect("reply within deadline")
        .expect("reply delivered");
    let continuation: NodeProgContinuation = weave_proto::parse(&bytes, MsgKind::NodeProg).unwrap();
    EdgeCountResult::from_bytes(&continuation.params).unwrap()
}

/// S1 — reachability hit across a 2-shard chain `s0:1 -> s0:2 -> s1:3`.
#[tokio::test]
async fn s1_reachability_hit_across_shards() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(5));
    let _shard1 = spin_up_shard(&net, 1, Duration::from_secs(5));
    let coord = net.endpoint(COORD, 8);
    let client = net.endpoint(CLIENT, 8);

    let creation = VectorClock::new(0, vec![1, 0]);
    add_edge(&shard0.store, 1, 1, &creation, RemoteNode::new(0, 2));
    add_edge(&shard0.store, 2, 1, &creation, RemoteNode::new(1, 3));

    let dest = RemoteNode::new(1, 3);
    let report_to = RemoteNode::new(COORD.0, 0);
    let kickoff = NodeProgContinuation {
        prog_type: ProgramType::Reachability,
        req_id: 1,
        req_clock: VectorClock::new(0, vec![1, 1]),
        target: RemoteNode::new(0, 1),
        params: ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        }
        .to_bytes(),
    };
    send_continuation(&client, Location(0), &kickoff).await;

    let result = recv_reachability_result(&coord).await;
    assert_eq!(result, ReachabilityResult { reachable: true, hops: 2 });
}

/// S2 — same graph as S1, but the final edge is tombstoned before the
/// request's observing clock, so the branch dead-ends instead.
#[tokio::test]
async fn s2_reachability_miss_past_deletion() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(5));
    let _shard1 = spin_up_shard(&net, 1, Duration::from_secs(5));
    let coord = net.endpoint(COORD, 8);
    let client = net.endpoint(CLIENT, 8);

    let creation = VectorClock::new(0, vec![1, 1]);
    add_edge(&shard0.store, 1, 1, &creation, RemoteNode::new(0, 2));

    let deletion = VectorClock::new(1, vec![2, 1]);
    let cell = shard0.store.get_or_create_node(2, &creation);
    cell.lock().unwrap().out_edges.insert(
        1,
        Edge {
            creation_vc: creation.clone(),
            deletion_vc: Some(deletion),
            properties: PropertySet::default(),
            neighbor: RemoteNode::new(1, 3),
        },
    );

    let dest = RemoteNode::new(1, 3);
    let report_to = RemoteNode::new(COORD.0, 0);
    let kickoff = NodeProgContinuation {
        prog_type: ProgramType::Reachability,
        req_id: 2,
        req_clock: VectorClock::new(0, vec![3, 1]),
        target: RemoteNode::new(0, 1),
        params: ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        }
        .to_bytes(),
    };
    send_continuation(&client, Location(0), &kickoff).await;

    let result = recv_reachability_result(&coord).await;
    assert!(!result.reachable);
}

/// S3 — triangle/edge-count fan-in: 3 shards, 10 nodes each, one super
/// node aggregating a report from every one of the 30 starting nodes.
/// Each node's out-edge count is derived deterministically so the
/// expected total is computed the same way the nodes are built,
/// rather than hand-summed.
#[tokio::test]
async fn s3_triangle_edge_count_fan_in() {
    let net = LoopbackNetwork::new();
    let shards: Vec<Shard> = (0..3)
        .map(|id| spin_up_shard(&net, id, Duration::from_secs(5)))
        .collect();
    let coord = net.endpoint(COORD, 8);
    let client = net.endpoint(CLIENT, 8);

    let creation = VectorClock::zero(0, 3);
    let req_clock = VectorClock::new(0, vec![1, 1, 1]);
    let super_node = RemoteNode::new(0, 0);
    let report_to = RemoteNode::new(COORD.0, 0);

    let mut expected_total = 0u64;
    for shard_id in 0..3u32 {
        let store = &shards[shard_id as usize].store;
        for local_id in 1..=10u64 {
            let edge_count = ((u64::from(shard_id) * 7 + local_id) % 5) + 1;
            expected_total += edge_count;
            for edge_id in 0..edge_count {
                add_edge(
                    store,
                    local_id,
                    edge_id,
                    &creation,
                    RemoteNode::new(shard_id, 9_000 + local_id),
                );
            }
        }
    }

    let init = NodeProgContinuation {
        prog_type: ProgramType::EdgeCount,
        req_id: 3,
        req_clock: req_clock.clone(),
        target: super_node,
        params: EdgeCountParams {
            super_node,
            report_to,
            returning: false,
            expected: 30,
            partial: 0,
        }
        .to_bytes(),
    };
    send_continuation(&client, Location(0), &init).await;

    for shard_id in 0..3u32 {
        for local_id in 1..=10u64 {
            let start = NodeProgContinuation {
                prog_type: ProgramType::EdgeCount,
                req_id: 3,
                req_clock: req_clock.clone(),
                target: RemoteNode::new(shard_id, local_id),
                params: EdgeCountParams {
                    super_node,
                    report_to,
                    returning: false,
                    expected: 0,
                    partial: 0,
                }
                .to_bytes(),
            };
            send_continuation(&client, Location(shard_id), &start).await;
        }
    }

    let result = recv_edge_count_result(&coord).await;
    assert_eq!(result.total, expected_total);
}

/// S5 — a node migrates away from the shard a neighbor's stale handle
/// still points to; the former owner replies `MIGRATED_NBR_UPDATE`
/// naming the new shard, and the sender retries there instead of the
/// node being reanimated on its old shard.
#[tokio::test]
async fn s5_migration_mid_request() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(5));
    let shard1 = spin_up_shard(&net, 1, Duration::from_secs(5));
    let coord = net.endpoint(COORD, 8);
    let client = net.endpoint(CLIENT, 8);

    let creation = VectorClock::new(0, vec![1, 0]);
    // Node 1 on shard 0 still believes node 3 lives on shard 1.
    add_edge(&shard0.store, 1, 1, &creation, RemoteNode::new(1, 3));
    // Node 3 has in fact migrated to shard 0 by the time the hop arrives.
    shard1.runtime.record_migration(3, 0);

    let dest = RemoteNode::new(1, 3);
    let report_to = RemoteNode::new(COORD.0, 0);
    let kickoff = NodeProgContinuation {
        prog_type: ProgramType::Reachability,
        req_id: 5,
        req_clock: VectorClock::new(0, vec![1, 1]),
        target: RemoteNode::new(0, 1),
        params: ReachabilityParams {
            dest,
            report_to,
            hops: 0,
            max_hops: 10,
        }
        .to_bytes(),
    };
    send_continuation(&client, Location(0), &kickoff).await;

    let result = recv_reachability_result(&coord).await;
    assert!(result.reachable);
    assert!(
        shard1.store.lock_node(3).is_none(),
        "migrated-away node must never be reanimated on its old shard"
    );
}

/// Property 6 — a fan-in super node emits exactly one final reply, and
/// only after every one of its `k` starting nodes has reported in.
#[tokio::test]
async fn property6_fan_in_waits_for_every_report() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(5));
    let _coord = net.endpoint(COORD, 8);

    let super_node = RemoteNode::new(0, 0);
    let report_to = RemoteNode::new(COORD.0, 0);
    let req_clock = VectorClock::new(0, vec![1]);

    shard0
        .runtime
        .handle_continuation(NodeProgContinuation {
            prog_type: ProgramType::EdgeCount,
            req_id: 42,
            req_clock: req_clock.clone(),
            target: super_node,
            params: EdgeCountParams {
                super_node,
                report_to,
                returning: false,
                expected: 3,
                partial: 0,
            }
            .to_bytes(),
        }, CLIENT)
        .await
        .unwrap();

    for partial in [1u64, 2, 3] {
        assert_eq!(shard0.runtime.requests().live_slot_count(42), 1);
        shard0
            .runtime
            .handle_continuation(NodeProgContinuation {
                prog_type: ProgramType::EdgeCount,
                req_id: 42,
                req_clock: req_clock.clone(),
                target: super_node,
                params: EdgeCountParams {
                    super_node,
                    report_to,
                    returning: true,
                    expected: 0,
                    partial,
                }
                .to_bytes(),
            }, CLIENT)
            .await
            .unwrap();
    }

    // The third report finished the aggregation, so the slot is gone.
    assert_eq!(shard0.runtime.requests().live_slot_count(42), 0);
}

/// Property 7 — a shard holds state for `req_id` exactly while it has
/// received a continuation that has not yet terminated or been
/// cancelled; it holds none before the first continuation and none
/// after the aggregator's final reply.
#[tokio::test]
async fn property7_state_presence_tracks_request_lifecycle() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(5));

    let super_node = RemoteNode::new(0, 0);
    let report_to = RemoteNode::new(COORD.0, 0);
    let req_clock = VectorClock::new(0, vec![1]);

    assert_eq!(shard0.runtime.requests().live_slot_count(7), 0);

    shard0
        .runtime
        .handle_continuation(NodeProgContinuation {
            prog_type: ProgramType::EdgeCount,
            req_id: 7,
            req_clock: req_clock.clone(),
            target: super_node,
            params: EdgeCountParams {
                super_node,
                report_to,
                returning: false,
                expected: 1,
                partial: 0,
            }
            .to_bytes(),
        }, CLIENT)
        .await
        .unwrap();
    assert_eq!(shard0.runtime.requests().live_slot_count(7), 1);

    shard0
        .runtime
        .handle_continuation(NodeProgContinuation {
            prog_type: ProgramType::EdgeCount,
            req_id: 7,
            req_clock: req_clock.clone(),
            target: super_node,
            params: EdgeCountParams {
                super_node,
                report_to,
                returning: true,
                expected: 0,
                partial: 9,
            }
            .to_bytes(),
        }, CLIENT)
        .await
        .unwrap();
    assert_eq!(shard0.runtime.requests().live_slot_count(7), 0);
}

/// Property 8 / S6 — cancelling a request leaves no shard holding any
/// state keyed on it, even mid-traversal. The original scenario issues
/// a 1000-node traversal; a 10-node super-node fan-in exercises the
/// same property (an aggregator with open state) at a size this test
/// can assert on deterministically.
#[tokio::test]
async fn property8_cancel_clears_all_state_keyed_on_the_request() {
    let net = LoopbackNetwork::new();
    let shard0 = spin_up_shard(&net, 0, Duration::from_secs(30));

    let super_node = RemoteNode::new(0, 0);
    let report_to = RemoteNode::new(COORD.0, 0);
    let req_clock = VectorClock::new(0, vec![1]);

    shard0
        .runtime
        .handle_continuation(NodeProgContinuation {
            prog_type: ProgramType::EdgeCount,
            req_id: 100,
            req_clock: req_clock.clone(),
            target: super_node,
            params: EdgeCountParams {
                super_node,
                report_to,
                returning: false,
                expected: 10,
                partial: 0,
            }
            .to_bytes(),
        }, CLIENT)
        .await
        .unwrap();
    for partial in [1u64, 2, 3] {
        shard0
            .runtime
            .handle_continuation(NodeProgContinuation {
                prog_type: ProgramType::EdgeCount,
                req_id: 100,
                req_clock: req_clock.clone(),
                target: super_node,
                params: EdgeCountParams {
                    super_node,
                    report_to,
                    returning: true,
                    expected: 0,
                    partial,
                }
                .to_bytes(),
            }, CLIENT)
            .await
            .unwrap();
    }
    assert_eq!(shard0.runtime.requests().live_slot_count(100), 1);

    shard0.runtime.cancel_request(100);
    assert_eq!(shard0.runtime.requests().live_slot_count(100), 0);
    assert!(shard0.runtime.requests().is_cancelled(100));

    // A late report arriving after cancellation must be dropped, not
    // revive the aggregator.
    let late = NodeProgContinuation {
        prog_type: ProgramType::EdgeCount,
        req_id: 100,
        req_clock,
        target: super_node,
        params: EdgeCountParams {
            super_node,
            report_to,
            returning: true,
            expected: 0,
            partial: 4,
        }
        .to_bytes(),
    };
    shard0
        .runtime
        .handle_continuation(late, CLIENT)
        .await
        .unwrap();
    assert_eq!(shard0.runtime.requests().live_slot_count(100), 0);
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Weave shard daemon (weave-shardd)
//!
//! Only an in-process, channel-backed transport exists today (see
//! `weave-transport::LoopbackNetwork`), so this binary wires up a whole
//! demo cluster in one process rather than one shard per process: a
//! coordinator plus `num_shards` shard runtimes, each with its own
//! worker pool, all reachable over a single shared loopback network.
//! `shard_id` from [`ShardConfig`] is not meaningful here (every shard
//! runs in this process); it is accepted for schema parity with a
//! real multi-process deployment and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use weave_config::{ConfigService, EnvConfigStore, ShardConfig};
use weave_runtime::{Coordinator, CoordinatorPool, ProgramRegistry, ShardRuntime, WorkerPool};
use weave_storage::{MemStore, Store};
use weave_transport::{Location, LoopbackNetwork};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Number of shards to run in this process.
    #[clap(long, default_value_t = 3)]
    num_shards: u32,

    /// Location the coordinator listens on. Defaults to one past the
    /// last shard id so it never collides with a shard endpoint.
    #[clap(long)]
    coord_id: Option<u32>,

    /// Tokio tasks draining each shard's inbound queue.
    #[clap(long, default_value_t = 4)]
    worker_threads: usize,

    /// Milliseconds a node-program request may run before it is
    /// cancelled for taking too long.
    #[clap(long, default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Inbound queue depth per endpoint before senders start blocking.
    #[clap(long, default_value_t = 4096)]
    backpressure_highwater: usize,

    /// Seconds between permanent-delete sweeps of tombstoned edges.
    #[clap(long, default_value_t = 30)]
    sweep_interval_secs: u64,
}

impl Args {
    fn into_shard_config(self) -> ShardConfig {
        let coord_id = self.coord_id.unwrap_or(self.num_shards);
        ShardConfig {
            shard_id: 0,
            num_shards: self.num_shards,
            coord_id,
            worker_threads: self.worker_threads,
            request_timeout_ms: self.request_timeout_ms,
            backpressure_highwater: self.backpressure_highwater,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let sweep_interval = Duration::from_secs(args.sweep_interval_secs);
    let cli_config = args.into_shard_config();

    // An operator running this in a container can override every field
    // above by setting WEAVE_CONFIG_SHARD to a JSON-encoded ShardConfig
    // rather than passing flags.
    let config_service = ConfigService::new(EnvConfigStore);
    let config = match config_service.load::<ShardConfig>("shard") {
        Ok(Some(cfg)) => {
            info!("loaded shard config from WEAVE_CONFIG_SHARD");
            cfg
        }
        Ok(None) => cli_config,
        Err(err) => {
            warn!(error = %err, "failed to read WEAVE_CONFIG_SHARD, using CLI flags");
            cli_config
        }
    };
    config.validate()?;

    info!(
        num_shards = config.num_shards,
        coord_id = config.coord_id,
        worker_threads = config.worker_threads,
        "starting weave-shardd"
    );

    let net = LoopbackNetwork::new();
    let request_timeout = Duration::from_millis(config.request_timeout_ms);

    let mut stores: Vec<Arc<dyn Store>> = Vec::with_capacity(config.num_shards as usize);
    let mut shard_pools = Vec::with_capacity(config.num_shards as usize);
    for shard_id in 0..config.num_shards {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let transport = Arc::new(net.endpoint(Location(shard_id), config.backpressure_highwater));
        let runtime = Arc::new(ShardRuntime::new(
            shard_id,
            store.clone(),
            transport,
            ProgramRegistry::with_builtins(),
            request_timeout,
        ));
        shard_pools.push(WorkerPool::spawn(config.worker_threads, runtime));
        stores.push(store);
        info!(shard_id, "shard runtime online");
    }

    let coord_transport = Arc::new(net.endpoint(
        Location(config.coord_id),
        config.backpressure_highwater,
    ));
    let coordinator = Arc::new(Coordinator::new(
        Location(config.coord_id),
        coord_transport,
        config.num_shards as usize,
    ));
    let coord_pool = CoordinatorPool::spawn(config.worker_threads, coordinator);
    info!(coord_id = config.coord_id, "coordinator online");

    let sweep_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let purged: usize = stores.iter().map(|s| s.permanent_delete_sweep()).sum();
            if purged > 0 {
                info!(purged, "permanent-delete sweep");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    sweep_task.abort();
    coord_pool.shutdown().await;
    for pool in shard_pools {
        pool.shutdown().await;
    }
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A fixed-size pool of tasks draining one shard's inbound transport.
//!
//! `Transport::recv` takes `&self`, so every worker task can hold the
//! same `Arc<T>` and call it concurrently — [`LoopbackTransport`]
//! serializes access through an internal mutex, meaning the pool's
//! tasks naturally load-balance the queue rather than needing a
//! separate fan-out structure.

use std::sync::Arc;

use weave_codec::CodecError;
use weave_proto::MsgKind;
use weave_transport::{Location, Transport};

use crate::cancel::CancelNodeProg;
use crate::error::WeaveError;
use crate::shard_runtime::ShardRuntime;

/// A running set of worker tasks. Dropping this without calling
/// [`WorkerPool::shutdown`] detaches the tasks; they keep running until
/// their transport's `recv` returns `None`.
pub struct WorkerPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` tasks (clamped to at least one), each
    /// looping `recv` → decode → dispatch against `runtime` until the
    /// transport shuts down.
    pub fn spawn<T>(worker_count: usize, runtime: Arc<ShardRuntime<T>>) -> Self
    where
        T: Transport + 'static,
    {
        let transport = runtime.transport_handle();
        let mut handles = Vec::with_capacity(worker_count.max(1));
        for _ in 0..worker_count.max(1) {
            let runtime = runtime.clone();
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let Some((from, bytes)) = transport.recv().await else {
                        break;
                    };
                    if let Err(err) = dispatch_one(&runtime, &bytes, from).await {
                        tracing::warn!(error = %err, "node-program dispatch failed");
                    }
                }
            }));
        }
        Self { handles }
    }

    /// Wait for every worker task to finish (their transport shut
    /// down). Intended for orderly process shutdown, not per-request
    /// synchronization.
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "worker task panicked");
            }
        }
    }
}

async fn dispatch_one<T: Transport>(
    runtime: &ShardRuntime<T>,
    bytes: &[u8],
    from: Location,
) -> Result<(), WeaveError> {
    match weave_proto::peek_kind(bytes) {
        Ok(MsgKind::NodeProg) => runtime.handle_node_prog_body(bytes, from).await,
        Ok(MsgKind::MigratedNbrUpdate) => runtime.handle_migrated_nbr_update_body(bytes).await,
        Ok(MsgKind::CancelNodeProg) => {
            let cancel: CancelNodeProg = weave_proto::parse(bytes, MsgKind::CancelNodeProg)?;
            runtime.cancel_request(cancel.req_id);
            Ok(())
        }
        Ok(other) => Err(WeaveError::Codec(CodecError::TypeMismatch {
            expected: "NodeProg, MigratedNbrUpdate, or CancelNodeProg message kind",
            found_tag: Some(other as u32),
        })),
        Err(err) => Err(err.into()),
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static configuration for one running shard process.

use serde::{Deserialize, Serialize};

use crate::store::ConfigError;

/// Configuration a shard daemon needs at startup. Unknown fields are
/// rejected rather than silently ignored, so a typo in a config file
/// fails fast instead of falling back to a default the operator didn't
/// intend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardConfig {
    /// This process's shard identity.
    pub shard_id: u32,
    /// Total number of shards in the cluster (for clock width and
    /// routing hash).
    pub num_shards: u32,
    /// Identity of the coordinator this shard reports to.
    pub coord_id: u32,
    /// Size of the Tokio worker pool draining the inbound queue.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// How long a node-program request waits for fan-in completion
    /// before it is cancelled.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Inbound queue depth at which new work is rejected rather than
    /// queued, to bound memory under overload.
    #[serde(default = "default_backpressure_highwater")]
    pub backpressure_highwater: usize,
}

const fn default_worker_threads() -> usize {
    4
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

const fn default_backpressure_highwater() -> usize {
    4096
}

impl ShardConfig {
    /// Validate cross-field invariants that `serde` alone cannot
    /// express (a single field's valid range is enforced by its type).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_shards == 0 {
            return Err(ConfigError::Other("num_shards must be non-zero".into()));
        }
        if self.shard_id >= self.num_shards {
            return Err(ConfigError::Other(format!(
                "shard_id {} out of range for num_shards {}",
                self.shard_id, self.num_shards
            )));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::Other("worker_threads must be non-zero".into()));
        }
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Environment-variable-backed `ConfigStore`, for containerized shard
//! deployments where a config file is inconvenient.

use crate::store::{ConfigError, ConfigStore};

/// Reads config blobs from `WEAVE_CONFIG_<KEY>` environment variables,
/// where `<KEY>` is `key` upper-cased. The value is expected to be a
/// JSON document, same as a file-backed store would hold.
///
/// Environment variables are process-lifetime immutable from this
/// store's point of view, so `save_raw` always fails; operators change
/// config by restarting the process with a new environment.
pub struct EnvConfigStore;

impl EnvConfigStore {
    fn var_name(key: &str) -> String {
        format!("WEAVE_CONFIG_{}", key.to_uppercase())
    }
}

impl ConfigStore for EnvConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match std::env::var(Self::var_name(key)) {
            Ok(val) => Ok(val.into_bytes()),
            Err(std::env::VarError::NotPresent) => Err(ConfigError::NotFound),
            Err(std::env::VarError::NotUnicode(_)) => {
                Err(ConfigError::Other(format!("{} is not valid UTF-8", key)))
            }
        }
    }

    fn save_raw(&self, _key: &str, _data: &[u8]) -> Result<(), ConfigError> {
        Err(ConfigError::Other(
            "environment-backed config is read-only at runtime".into(),
        ))
    }
}

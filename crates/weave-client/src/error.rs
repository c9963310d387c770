// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors a caller of [`crate::WeaveClient`] can observe.

use thiserror::Error;

/// Everything that can keep `run_node_program` from returning a result.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply arrived before the caller-supplied deadline. The
    /// request's entry is dropped from the pending-request table, but
    /// the program itself keeps running server-side; nothing currently
    /// tells the coordinator to abandon it early.
    #[error("request timed out waiting for a reply")]
    Timeout,
    /// This request was abandoned via [`crate::WeaveClient::cancel`]
    /// before a reply arrived.
    #[error("request was cancelled")]
    Cancelled,
    /// The coordinator was unreachable, or its background read loop
    /// shut down (its transport was closed) while this request was
    /// still pending.
    #[error("connection to the coordinator was lost")]
    TransportDown,
    /// The reply's body did not decode as the caller's expected result
    /// type.
    #[error("protocol error: {0}")]
    Protocol(#[from] weave_codec::CodecError),
}

impl From<weave_transport::TransportError> for ClientError {
    fn from(_: weave_transport::TransportError) -> Self {
        Self::TransportDown
    }
}

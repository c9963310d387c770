// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The versioned visibility predicate: which entities exist at a given
//! request clock.

use crate::vclock::{total_order, ClockOrder, VectorClock};

/// An entity with `creation_vc` and optional `deletion_vc` is visible to
/// a request observing clock `r` iff it was created at or before `r`
/// and either was never deleted or was deleted strictly after `r`.
#[must_use]
pub fn visible(creation_vc: &VectorClock, deletion_vc: Option<&VectorClock>, r: &VectorClock) -> bool {
    let created = matches!(total_order(creation_vc, r), ClockOrder::Before | ClockOrder::Equal);
    if !created {
        return false;
    }
    match deletion_vc {
        None => true,
        Some(d) => matches!(total_order(d, r), ClockOrder::After),
    }
}

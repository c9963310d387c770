// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vector clocks and the deterministic total order used for visibility.

use weave_codec::{Cursor, Packable, Result as CodecResult};

/// Identity of a shard in the cluster.
pub type ShardId = u32;

/// A vector clock: one monotonically non-decreasing counter per shard,
/// plus the shard that most recently advanced it (needed for the
/// concurrent tie-break in [`total_order`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorClock {
    origin: ShardId,
    counters: Vec<u64>,
}

impl VectorClock {
    /// Construct a clock with explicit per-shard counters and origin.
    #[must_use]
    pub fn new(origin: ShardId, counters: Vec<u64>) -> Self {
        Self { origin, counters }
    }

    /// A zero clock for `num_shards` shards, originating at `origin`.
    #[must_use]
    pub fn zero(origin: ShardId, num_shards: usize) -> Self {
        Self {
            origin,
            counters: vec![0; num_shards],
        }
    }

    /// The shard that authored this clock value (for tie-break purposes).
    #[must_use]
    pub fn origin(&self) -> ShardId {
        self.origin
    }

    /// Per-shard counters, in shard-index order.
    #[must_use]
    pub fn counters(&self) -> &[u64] {
        &self.counters
    }

    /// Counter for `shard`, or 0 if the clock has no component for it.
    #[must_use]
    pub fn get(&self, shard: usize) -> u64 {
        self.counters.get(shard).copied().unwrap_or(0)
    }

    /// Component-wise max of `self` and `other`, used when merging
    /// clocks observed from incoming messages. The result's origin is
    /// whichever side actually advanced a component strictly past the
    /// other; ties keep `self`'s origin.
    #[must_use]
    pub fn join(&self, other: &VectorClock) -> VectorClock {
        let len = self.counters.len().max(other.counters.len());
        let mut merged = Vec::with_capacity(len);
        for i in 0..len {
            merged.push(self.get(i).max(other.get(i)));
        }
        VectorClock {
            origin: self.origin,
            counters: merged,
        }
    }

    /// Increment this shard's own component by one, extending the
    /// counter vector if `shard_id` is past its current length.
    #[must_use]
    pub fn advance(&self, shard_id: ShardId) -> VectorClock {
        let idx = shard_id as usize;
        let mut counters = self.counters.clone();
        if counters.len() <= idx {
            counters.resize(idx + 1, 0);
        }
        counters[idx] += 1;
        VectorClock {
            origin: shard_id,
            counters,
        }
    }
}

impl Packable for VectorClock {
    fn size(&self) -> usize {
        self.origin.size() + self.counters.size()
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        self.origin.pack(buf);
        self.counters.pack(buf);
    }

    fn unpack(cur: &mut Cursor<'_>) -> CodecResult<Self> {
        let origin = ShardId::unpack(cur)?;
        let counters = Vec::<u64>::unpack(cur)?;
        Ok(Self { origin, counters })
    }
}

/// Result of comparing two vector clocks before the concurrent
/// tie-break is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrder {
    /// `a` happened strictly before `b`.
    Before,
    /// `a` happened strictly after `b`.
    After,
    /// `a` and `b` are identical.
    Equal,
    /// Neither dominates the other.
    Concurrent,
}

/// Compare two vector clocks component-wise. Returns `Concurrent` when
/// neither dominates — callers needing a total order call
/// [`total_order`] instead, which applies the deterministic tie-break.
#[must_use]
pub fn compare(a: &VectorClock, b: &VectorClock) -> ClockOrder {
    let len = a.counters.len().max(b.counters.len());
    let mut less = false;
    let mut greater = false;
    for i in 0..len {
        let av = a.get(i);
        let bv = b.get(i);
        match av.cmp(&bv) {
            std::cmp::Ordering::Less => less = true,
            std::cmp::Ordering::Greater => greater = true,
            std::cmp::Ordering::Equal => {}
        }
    }
    match (less, greater) {
        (false, false) => ClockOrder::Equal,
        (true, false) => ClockOrder::Before,
        (false, true) => ClockOrder::After,
        (true, true) => ClockOrder::Concurrent,
    }
}

/// Total order over vector clocks, for visibility decisions. Collapses
/// `Concurrent` pairs with the tie-break rule: the lexicographically
/// smaller `(shard-id, counter)` pair of the originating shard wins.
#[must_use]
pub fn total_order(a: &VectorClock, b: &VectorClock) -> ClockOrder {
    match compare(a, b) {
        ClockOrder::Concurrent => {
            let a_key = (a.origin, a.get(a.origin as usize));
            let b_key = (b.origin, b.get(b.origin as usize));
            match a_key.cmp(&b_key) {
                std::cmp::Ordering::Less => ClockOrder::Before,
                std::cmp::Ordering::Greater => ClockOrder::After,
                std::cmp::Ordering::Equal => ClockOrder::Equal,
            }
        }
        other => other,
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-shard bookkeeping of in-flight requests: which program-state
//! slots a request currently has open here, its wall-clock deadline,
//! and whether it has been cancelled.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ReqId;

struct Entry {
    deadline: Instant,
    live_slots: u64,
}

/// Tracks, per `req_id`, how many program-state slots this shard
/// currently has open and when the request should be treated as timed
/// out. Once `cancel` is called for a `req_id`, that id is remembered
/// as cancelled so continuations arriving late are dropped rather than
/// reviving dead state.
pub struct RequestTable {
    entries: Mutex<HashMap<ReqId, Entry>>,
    cancelled: Mutex<HashSet<ReqId>>,
}

impl Default for RequestTable {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(HashSet::new()),
        }
    }
}

impl RequestTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a program-state slot was just created for
    /// `req_id`, arming its deadline on first touch.
    pub fn note_slot_created(&self, req_id: ReqId, timeout: Duration) {
        let mut entries = self.lock_entries();
        let entry = entries.entry(req_id).or_insert_with(|| Entry {
            deadline: Instant::now() + timeout,
            live_slots: 0,
        });
        entry.live_slots += 1;
    }

    /// Record that a program-state slot for `req_id` was dropped
    /// (the program terminated at that node). Once no slots remain,
    /// the request is forgotten entirely.
    pub fn note_slot_dropped(&self, req_id: ReqId) {
        let mut entries = self.lock_entries();
        let mut drop_entry = false;
        if let Some(entry) = entries.get_mut(&req_id) {
            entry.live_slots = entry.live_slots.saturating_sub(1);
            drop_entry = entry.live_slots == 0;
        }
        if drop_entry {
            entries.remove(&req_id);
        }
    }

    /// Number of program-state slots this shard currently has open for
    /// `req_id`.
    #[must_use]
    pub fn live_slot_count(&self, req_id: ReqId) -> u64 {
        self.lock_entries().get(&req_id).map_or(0, |e| e.live_slots)
    }

    /// Whether `req_id`'s deadline has passed.
    #[must_use]
    pub fn is_expired(&self, req_id: ReqId, now: Instant) -> bool {
        self.lock_entries()
            .get(&req_id)
            .is_some_and(|e| now >= e.deadline)
    }

    /// Forget all state for `req_id` and remember it as cancelled so
    /// later continuations for it are dropped.
    pub fn cancel(&self, req_id: ReqId) {
        self.lock_entries().remove(&req_id);
        self.lock_cancelled().insert(req_id);
    }

    /// Whether `req_id` has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self, req_id: ReqId) -> bool {
        self.lock_cancelled().contains(&req_id)
    }

    /// Number of distinct requests with at least one open slot.
    #[must_use]
    pub fn active_request_count(&self) -> usize {
        self.lock_entries().len()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<ReqId, Entry>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_cancelled(&self) -> std::sync::MutexGuard<'_, HashSet<ReqId>> {
        self.cancelled.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_lifecycle_tracks_live_count() {
        let table = RequestTable::new();
        table.note_slot_created(1, Duration::from_secs(30));
        table.note_slot_created(1, Duration::from_secs(30));
        assert_eq!(table.live_slot_count(1), 2);
        table.note_slot_dropped(1);
        assert_eq!(table.live_slot_count(1), 1);
        table.note_slot_dropped(1);
        assert_eq!(table.live_slot_count(1), 0);
        assert_eq!(table.active_request_count(), 0);
    }

    #[test]
    fn cancel_clears_state_and_is_sticky() {
        let table = RequestTable::new();
        table.note_slot_created(5, Duration::from_secs(30));
        table.cancel(5);
        assert_eq!(table.live_slot_count(5), 0);
        assert!(table.is_cancelled(5));
    }

    #[test]
    fn expiry_is_relative_to_creation_time() {
        let table = RequestTable::new();
        table.note_slot_created(1, Duration::from_millis(0));
        assert!(table.is_expired(1, Instant::now() + Duration::from_millis(1)));
    }

    #[test]
    fn untouched_request_is_not_cancelled() {
        let table = RequestTable::new();
        assert!(!table.is_cancelled(42));
    }
}

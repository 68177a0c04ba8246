// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Deadline queue for the map-cache timers

use crate::mapcache::entry::ArmedTimers;
use crate::mapping::EidKey;
use ahash::RandomState;
use priority_queue::PriorityQueue;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// The mapping TTL ran out
    Expiry,
    /// A Map-Request went unanswered
    Retry,
    /// A solicit-map-request asked to refresh the mapping
    Smr,
}

impl TimerKind {
    pub(crate) const fn flag(self) -> ArmedTimers {
        match self {
            TimerKind::Expiry => ArmedTimers::EXPIRY,
            TimerKind::Retry => ArmedTimers::RETRY,
            TimerKind::Smr => ArmedTimers::SMR,
        }
    }
}

impl Display for TimerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::Expiry => write!(f, "expiry"),
            TimerKind::Retry => write!(f, "retry"),
            TimerKind::Smr => write!(f, "smr"),
        }
    }
}

// Earliest deadline first
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline(Instant);

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TimerQueue {
    pq: PriorityQueue<(EidKey, TimerKind), Deadline, RandomState>,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self {
            pq: PriorityQueue::with_default_hasher(),
        }
    }
}

impl TimerQueue {
    /// Arm or re-arm a timer
    pub(crate) fn arm(&mut self, key: EidKey, kind: TimerKind, at: Instant) {
        self.pq.push((key, kind), Deadline(at));
    }

    pub(crate) fn disarm(&mut self, key: EidKey, kind: TimerKind) {
        self.pq.remove(&(key, kind));
    }

    pub(crate) fn disarm_all(&mut self, key: EidKey) {
        for kind in [TimerKind::Expiry, TimerKind::Retry, TimerKind::Smr] {
            self.disarm(key, kind);
        }
    }

    pub(crate) fn deadline(&self, key: EidKey, kind: TimerKind) -> Option<Instant> {
        self.pq.get_priority(&(key, kind)).map(|d| d.0)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pq.peek().map(|(_, d)| d.0)
    }

    /// Pop the earliest timer if it is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(EidKey, TimerKind)> {
        if self.next_deadline()? > now {
            return None;
        }
        self.pq.pop().map(|(item, _)| item)
    }

    pub(crate) fn len(&self) -> usize {
        self.pq.len()
    }
}

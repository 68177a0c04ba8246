// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The map-cache: mappings of remote EIDs, learned from Map-Replies or configured.
//!
//! Each dynamic entry has three timers. The expiry timer runs while the entry is active and
//! marks it stale when the TTL runs out. The retry timer runs while a Map-Request is
//! unanswered. The SMR timer delays the refresh solicited by a peer. Firing timers are
//! reported by [`MapCache::expire`]; sending the Map-Requests they call for is left to the
//! caller.

mod entry;
mod timers;

pub use entry::{ArmedTimers, HowLearned, MapCacheEntry};
pub use timers::TimerKind;

use crate::errors::MapCacheError;
use crate::mapping::{EidKey, Mapping};
use crate::nonce::Nonce;
use crate::table::EidTable;
use std::time::{Duration, Instant};
use timers::TimerQueue;
use tracing::{debug, info, warn};

use tracectl::trace_target;
trace_target!("map-cache", LevelFilter::INFO, &["lisp", "map-cache"]);

/// What a firing timer calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapCacheEvent {
    /// The entry TTL ran out. The entry is stale and should be resolved again.
    Expired(EidKey),
    /// The last Map-Request for the entry went unanswered.
    RetryDue { eid: EidKey, attempts: usize },
    /// A solicited refresh is due.
    SmrInvalidation(EidKey),
}

/// How a Map-Reply record was handled
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The nonce matched: the entry is active with the new mapping.
    Activated,
    /// No entry waits for this nonce. Nothing changed.
    UnknownNonce,
}

#[derive(Debug, Default)]
pub struct MapCache {
    entries: EidTable<MapCacheEntry>,
    timers: TimerQueue,
}

impl MapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. The timers of a replaced entry are disarmed.
    pub fn insert(&mut self, entry: MapCacheEntry) -> Option<MapCacheEntry> {
        let eid = *entry.eid();
        debug!("Inserting map-cache entry {entry}");
        let old = self.entries.insert(eid, entry);
        if old.is_some() {
            self.timers.disarm_all(eid);
        }
        old
    }

    /// Insert a configured mapping
    pub fn insert_static(&mut self, mapping: Mapping) -> Option<MapCacheEntry> {
        self.insert(MapCacheEntry::new_static(mapping))
    }

    /// Remove an entry after disarming its timers.
    pub fn invalidate(&mut self, eid: &EidKey) -> Option<MapCacheEntry> {
        self.timers.disarm_all(*eid);
        let removed = self.entries.remove(eid);
        if let Some(entry) = &removed {
            debug!("Removed map-cache entry {entry}");
        }
        removed
    }

    /// The entry most specifically covering `eid`, whatever its state
    #[must_use]
    pub fn lookup(&self, eid: &EidKey) -> Option<&MapCacheEntry> {
        self.entries.lookup(eid).map(|(_, entry)| entry)
    }

    /// The mapping covering `eid`, if its entry can be used to forward
    #[must_use]
    pub fn lookup_usable(&self, eid: &EidKey) -> Option<&Mapping> {
        self.lookup(eid)
            .filter(|entry| entry.is_usable())
            .map(MapCacheEntry::mapping)
    }

    /// The entry for exactly `eid`
    #[must_use]
    pub fn lookup_exact(&self, eid: &EidKey) -> Option<&MapCacheEntry> {
        self.entries.get(eid)
    }

    /// Record a Map-Request sent to resolve `eid`, creating a pending entry if needed, and
    /// arm its retry timer.
    ///
    /// # Errors
    ///
    /// Fails for static entries, and when the request budget is exhausted, in which case
    /// the entry is removed.
    pub fn register_request(
        &mut self,
        eid: EidKey,
        nonce: Nonce,
        now: Instant,
        retry_interval: Duration,
    ) -> Result<(), MapCacheError> {
        if self.entries.get(&eid).is_none() {
            self.insert(MapCacheEntry::pending(eid));
        }
        let entry = self
            .entries
            .get_mut(&eid)
            .ok_or(MapCacheError::UnknownEntry(eid))?;
        if entry.how_learned == HowLearned::Static {
            return Err(MapCacheError::StaticEntry(eid));
        }
        if entry.nonces.push(nonce).is_err() {
            warn!("No reply to {} map-requests for {eid}, giving up", entry.nonces.len());
            self.invalidate(&eid);
            return Err(MapCacheError::RetryBudgetExhausted(eid));
        }
        entry.timers |= ArmedTimers::RETRY;
        self.timers.arm(eid, TimerKind::Retry, now + retry_interval);
        debug!("Map-request for {eid} with nonce {nonce}");
        Ok(())
    }

    /// Handle a Map-Reply record for `eid` echoing `nonce`.
    ///
    /// The reply is accepted if the entry for `eid`, or a pending entry it covers, waits for
    /// `nonce`. The entry then becomes active with `mapping`, the retry timer is disarmed and
    /// the expiry timer is armed to `ttl`. A pending entry the reply covers is replaced by
    /// one for `eid`.
    ///
    /// # Errors
    ///
    /// Fails if the entry for `eid` is static.
    pub fn process_reply(
        &mut self,
        eid: EidKey,
        mapping: Mapping,
        nonce: Nonce,
        ttl: Duration,
        now: Instant,
    ) -> Result<ReplyOutcome, MapCacheError> {
        let target = match self.entries.get(&eid) {
            Some(entry) if entry.how_learned == HowLearned::Static => {
                return Err(MapCacheError::StaticEntry(eid));
            }
            Some(entry) if entry.nonces.check(nonce) => Some(eid),
            Some(_) => None,
            None => self.pending_covered_by(&eid, nonce),
        };
        let Some(waiting) = target else {
            debug!("Ignoring reply for {eid}: unknown nonce {nonce}");
            return Ok(ReplyOutcome::UnknownNonce);
        };
        if waiting != eid {
            // the reply is for a less specific prefix than requested
            self.invalidate(&waiting);
            self.insert(MapCacheEntry::pending(eid));
        }
        let entry = self
            .entries
            .get_mut(&eid)
            .ok_or(MapCacheError::UnknownEntry(eid))?;
        entry.mapping = mapping.with_eid(eid);
        entry.active = true;
        entry.stale = false;
        entry.ttl = ttl;
        entry.confirmed = Some(now);
        entry.nonces.clear();
        entry.timers.remove(ArmedTimers::RETRY);
        entry.timers |= ArmedTimers::EXPIRY;
        self.timers.disarm(eid, TimerKind::Retry);
        self.timers.arm(eid, TimerKind::Expiry, now + ttl);
        info!("Map-cache entry {eid} activated, ttl {}s", ttl.as_secs());
        Ok(ReplyOutcome::Activated)
    }

    fn pending_covered_by(&self, eid: &EidKey, nonce: Nonce) -> Option<EidKey> {
        self.entries
            .iter()
            .find(|(key, entry)| {
                entry.how_learned == HowLearned::Dynamic
                    && eid.covers(key)
                    && entry.nonces.check(nonce)
            })
            .map(|(key, _)| key)
    }

    /// Arm the SMR timer of an entry.
    ///
    /// # Errors
    ///
    /// Fails if there is no entry for exactly `eid`.
    pub fn schedule_smr_invalidation(
        &mut self,
        eid: &EidKey,
        at: Instant,
    ) -> Result<(), MapCacheError> {
        let entry = self
            .entries
            .get_mut(eid)
            .ok_or(MapCacheError::UnknownEntry(*eid))?;
        entry.timers |= ArmedTimers::SMR;
        self.timers.arm(*eid, TimerKind::Smr, at);
        Ok(())
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn expire(&mut self, now: Instant) -> Vec<MapCacheEvent> {
        let mut events = Vec::new();
        while let Some((eid, kind)) = self.timers.pop_due(now) {
            let Some(entry) = self.entries.get_mut(&eid) else {
                continue;
            };
            entry.timers.remove(kind.flag());
            let event = match kind {
                TimerKind::Expiry => {
                    entry.stale = true;
                    info!("Map-cache entry {eid} expired");
                    MapCacheEvent::Expired(eid)
                }
                TimerKind::Retry => MapCacheEvent::RetryDue {
                    eid,
                    attempts: entry.nonces.len(),
                },
                TimerKind::Smr => MapCacheEvent::SmrInvalidation(eid),
            };
            debug!("Timer {kind} fired for {eid}");
            events.push(event);
        }
        events
    }

    /// The deadline of the next timer to fire
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// The deadline of one timer of an entry
    #[must_use]
    pub fn deadline(&self, eid: &EidKey, kind: TimerKind) -> Option<Instant> {
        self.timers.deadline(*eid, kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapCacheEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }
}

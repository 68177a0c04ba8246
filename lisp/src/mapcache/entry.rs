// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::mapping::{EidKey, Mapping};
use crate::nonce::NonceList;
use bitflags::bitflags;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

bitflags! {
    /// Timers currently armed for an entry
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct ArmedTimers: u8 {
        const EXPIRY = 0b001;
        const RETRY = 0b010;
        const SMR = 0b100;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HowLearned {
    /// Configured, never expires
    Static,
    /// Learned from a Map-Reply
    Dynamic,
}

impl Display for HowLearned {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HowLearned::Static => write!(f, "static"),
            HowLearned::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A map-cache entry.
///
/// Dynamic entries start inactive, with the nonces of the requests sent to resolve them.
/// They become active when a reply echoing one of these nonces comes in.
#[derive(Debug, Clone)]
pub struct MapCacheEntry {
    pub(crate) mapping: Mapping,
    pub(crate) how_learned: HowLearned,
    pub(crate) active: bool,
    pub(crate) stale: bool,
    pub(crate) ttl: Duration,
    pub(crate) confirmed: Option<Instant>,
    pub(crate) timers: ArmedTimers,
    pub(crate) nonces: NonceList,
}

impl MapCacheEntry {
    /// An entry being resolved
    #[must_use]
    pub fn pending(eid: EidKey) -> Self {
        Self {
            mapping: Mapping::new(eid),
            how_learned: HowLearned::Dynamic,
            active: false,
            stale: false,
            ttl: Duration::ZERO,
            confirmed: None,
            timers: ArmedTimers::empty(),
            nonces: NonceList::new(),
        }
    }

    /// A configured entry, active from the start
    #[must_use]
    pub fn new_static(mapping: Mapping) -> Self {
        Self {
            mapping,
            how_learned: HowLearned::Static,
            active: true,
            stale: false,
            ttl: Duration::MAX,
            confirmed: None,
            timers: ArmedTimers::empty(),
            nonces: NonceList::new(),
        }
    }

    #[must_use]
    pub fn eid(&self) -> &EidKey {
        self.mapping.eid()
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[must_use]
    pub fn how_learned(&self) -> HowLearned {
        self.how_learned
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Active, fresh and with at least one locator
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.active && !self.stale && !self.mapping.is_negative()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// When the last accepted reply came in
    #[must_use]
    pub fn last_confirmed(&self) -> Option<Instant> {
        self.confirmed
    }

    #[must_use]
    pub fn armed_timers(&self) -> ArmedTimers {
        self.timers
    }

    #[must_use]
    pub fn nonces(&self) -> &NonceList {
        &self.nonces
    }
}

impl Display for MapCacheEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match (self.active, self.stale) {
            (false, _) => "inactive",
            (true, true) => "stale",
            (true, false) => "active",
        };
        write!(f, "{} ({}, {state}", self.mapping, self.how_learned)?;
        if self.how_learned == HowLearned::Dynamic && self.active {
            write!(f, ", ttl {}s", self.ttl.as_secs())?;
        }
        write!(f, ")")
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! 64-bit nonces correlating Map-Requests with their Map-Replies.
//!
//! Nonces are built from the monotonic clock. They are not meant to be unpredictable, only
//! unlikely to repeat between two requests.

use crate::errors::NonceError;
use arrayvec::ArrayVec;
use nix::time::{ClockId, clock_gettime};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Requests (first one and retransmissions) that may be outstanding for one EID.
pub const MAX_OUTSTANDING_REQUESTS: usize = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(u64);

impl Nonce {
    /// Compose a nonce from a clock reading.
    ///
    /// The lower half is the nanoseconds or'ed with `seed`. The upper half is the seconds
    /// xor'ed with the byte swapped nanoseconds.
    #[must_use]
    pub fn from_clock(secs: u32, nanos: u32, seed: u32) -> Nonce {
        let upper = secs ^ nanos.swap_bytes();
        let lower = nanos | seed;
        Nonce((u64::from(upper) << 32) | u64::from(lower))
    }

    /// Build a nonce from the monotonic clock.
    ///
    /// # Errors
    ///
    /// Fails if the clock cannot be read.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // wrap around is fine
    pub fn build(seed: u32) -> Result<Nonce, NonceError> {
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(NonceError::Clock)?;
        Ok(Self::from_clock(
            now.tv_sec() as u32,
            now.tv_nsec() as u32,
            seed,
        ))
    }

    /// Build a nonce seeded with the wall clock seconds.
    ///
    /// # Errors
    ///
    /// Fails if the clock cannot be read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn build_time() -> Result<Nonce, NonceError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        Self::build(secs)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn upper(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn lower(self) -> u32 {
        self.0 as u32
    }
}

impl From<u64> for Nonce {
    fn from(raw: u64) -> Self {
        Nonce(raw)
    }
}

impl From<Nonce> for u64 {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08x}-0x{:08x}", self.upper(), self.lower())
    }
}

/// Nonces of the requests sent for an EID and not answered yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceList(ArrayVec<Nonce, MAX_OUTSTANDING_REQUESTS>);

impl NonceList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the nonce of a request just sent.
    ///
    /// # Errors
    ///
    /// Returns [`NonceError::RetryBudgetExhausted`] if the list is full.
    pub fn push(&mut self, nonce: Nonce) -> Result<(), NonceError> {
        self.0
            .try_push(nonce)
            .map_err(|_| NonceError::RetryBudgetExhausted(MAX_OUTSTANDING_REQUESTS))
    }

    /// True if `nonce` belongs to an outstanding request
    #[must_use]
    pub fn check(&self, nonce: Nonce) -> bool {
        self.0.contains(&nonce)
    }

    /// Forget all outstanding requests
    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nonce> {
        self.0.iter()
    }
}

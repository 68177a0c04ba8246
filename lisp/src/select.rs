// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Locator selection.
//!
//! Among the usable locators of a family, only those sharing the best (lowest) priority are
//! candidates. One of them is picked with a probability proportional to its weight, using
//! the flow hash of the packet so that a flow sticks to a locator as long as the candidates
//! do not change.

use crate::errors::SelectError;
use crate::locator::{Locator, SocketKey};
use crate::mapping::Mapping;
use net::ip::Afi;
use net::tuple::PacketTuple;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// Outer addresses and output socket for a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingEntry {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub socket: Option<SocketKey>,
}

impl ForwardingEntry {
    /// Send from `src` to `dst`, unless `src` is behind a NAT in which case its first RTR
    /// is the destination.
    #[must_use]
    pub fn new(src: &Locator, dst: IpAddr) -> Self {
        let dst = src.rtrs().first().copied().unwrap_or(dst);
        Self {
            src: src.addr(),
            dst,
            socket: src.socket().cloned(),
        }
    }
}

impl Display for ForwardingEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)?;
        if let Some(socket) = &self.socket {
            write!(f, " on {socket}")?;
        }
        Ok(())
    }
}

/// A source and a destination locator of the same family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorPair<'s, 'd> {
    pub src: &'s Locator,
    pub dst: &'d Locator,
}

// The best priority tier of a list sorted by priority
fn best_tier(locators: &[Locator]) -> &[Locator] {
    let Some(first) = locators.iter().position(Locator::is_usable) else {
        return &[];
    };
    let best = locators[first].priority();
    let len = locators[first..]
        .iter()
        .take_while(|l| l.priority() == best)
        .count();
    &locators[first..first + len]
}

fn pick(locators: &[Locator], hash: u32) -> Option<&Locator> {
    let tier = best_tier(locators);
    if tier.is_empty() {
        return None;
    }
    let total: u32 = tier.iter().map(|l| u32::from(l.weight())).sum();
    if total == 0 {
        // all weights zero: equal shares
        let count = u32::try_from(tier.len()).unwrap_or(u32::MAX);
        return usize::try_from(hash % count).ok().and_then(|i| tier.get(i));
    }
    let mut point = hash % total;
    for locator in tier {
        let weight = u32::from(locator.weight());
        if point < weight {
            return Some(locator);
        }
        point -= weight;
    }
    None
}

/// Families to try for the source: the best priority first, ties going to the packet family.
fn family_order(mapping: &Mapping, tuple: &PacketTuple) -> [Afi; 2] {
    let own = Afi::of(&tuple.src());
    let best = |afi| best_tier(mapping.locators(afi)).first().map(Locator::priority);
    match (best(own), best(own.other())) {
        (None, Some(_)) => [own.other(), own],
        (Some(p), Some(o)) if o < p => [own.other(), own],
        _ => [own, own.other()],
    }
}

/// Pick the source locator for a packet.
///
/// # Errors
///
/// Fails if the mapping has no usable locator.
pub fn select_source<'m>(mapping: &'m Mapping, tuple: &PacketTuple) -> Result<&'m Locator, SelectError> {
    let hash = tuple.flow_hash();
    family_order(mapping, tuple)
        .into_iter()
        .find_map(|afi| pick(mapping.locators(afi), hash))
        .ok_or(SelectError::NoLocator)
}

/// Pick a source and a destination locator of the same family for a packet.
///
/// # Errors
///
/// Returns [`SelectError::NoLocator`] if the source mapping has no usable locator and
/// [`SelectError::NoCompatibleAfi`] if no family has usable locators on both sides.
pub fn select_pair<'s, 'd>(
    src_mapping: &'s Mapping,
    dst_mapping: &'d Mapping,
    tuple: &PacketTuple,
) -> Result<LocatorPair<'s, 'd>, SelectError> {
    let hash = tuple.flow_hash();
    let mut found_source = false;
    for afi in family_order(src_mapping, tuple) {
        let Some(src) = pick(src_mapping.locators(afi), hash) else {
            continue;
        };
        found_source = true;
        if let Some(dst) = pick(dst_mapping.locators(afi), hash) {
            return Ok(LocatorPair { src, dst });
        }
    }
    if found_source {
        Err(SelectError::NoCompatibleAfi)
    } else {
        Err(SelectError::NoLocator)
    }
}

/// Select locators for a packet and apply the NAT override.
///
/// # Errors
///
/// See [`select_pair`].
pub fn forwarding_entry(
    src_mapping: &Mapping,
    dst_mapping: &Mapping,
    tuple: &PacketTuple,
) -> Result<ForwardingEntry, SelectError> {
    let pair = select_pair(src_mapping, dst_mapping, tuple)?;
    Ok(ForwardingEntry::new(pair.src, pair.dst.addr()))
}

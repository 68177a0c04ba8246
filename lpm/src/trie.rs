// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Longest prefix match table holding both IPv4 and IPv6 prefixes.

use crate::prefix::Prefix;
use ipnet::{Ipv4Net, Ipv6Net};
use prefix_trie::PrefixMap;
use std::net::IpAddr;

/// A map from [`Prefix`] to `V` with longest prefix match lookups.
///
/// IPv4 and IPv6 prefixes live in separate tries; a lookup never crosses families.
#[derive(Debug, Clone)]
pub struct IpPrefixTrie<V> {
    v4: PrefixMap<Ipv4Net, V>,
    v6: PrefixMap<Ipv6Net, V>,
}

impl<V> Default for IpPrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IpPrefixTrie<V> {
    /// An empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            v4: PrefixMap::new(),
            v6: PrefixMap::new(),
        }
    }

    /// Insert `value` at exactly `prefix`, returning the value it replaces.
    pub fn insert(&mut self, prefix: Prefix, value: V) -> Option<V> {
        match prefix {
            Prefix::IPV4(p) => self.v4.insert(p, value),
            Prefix::IPV6(p) => self.v6.insert(p, value),
        }
    }

    /// Remove the value at exactly `prefix`.
    pub fn remove(&mut self, prefix: &Prefix) -> Option<V> {
        match prefix {
            Prefix::IPV4(p) => self.v4.remove(p),
            Prefix::IPV6(p) => self.v6.remove(p),
        }
    }

    /// Get the value at exactly `prefix`, without LPM.
    #[must_use]
    pub fn get(&self, prefix: &Prefix) -> Option<&V> {
        match prefix {
            Prefix::IPV4(p) => self.v4.get(p),
            Prefix::IPV6(p) => self.v6.get(p),
        }
    }

    /// Get the value at exactly `prefix`, without LPM.
    pub fn get_mut(&mut self, prefix: &Prefix) -> Option<&mut V> {
        match prefix {
            Prefix::IPV4(p) => self.v4.get_mut(p),
            Prefix::IPV6(p) => self.v6.get_mut(p),
        }
    }

    /// Longest prefix covering `key`. `key` may be an address or a prefix.
    pub fn lookup<Q: Into<Prefix>>(&self, key: Q) -> Option<(Prefix, &V)> {
        match key.into() {
            Prefix::IPV4(p) => self.v4.get_lpm(&p).map(|(p, v)| (Prefix::IPV4(*p), v)),
            Prefix::IPV6(p) => self.v6.get_lpm(&p).map(|(p, v)| (Prefix::IPV6(*p), v)),
        }
    }

    /// Longest prefix covering `key`. `key` may be an address or a prefix.
    pub fn lookup_mut<Q: Into<Prefix>>(&mut self, key: Q) -> Option<(Prefix, &mut V)> {
        match key.into() {
            Prefix::IPV4(p) => self
                .v4
                .get_lpm_mut(&p)
                .map(|(p, v)| (Prefix::IPV4(*p), v)),
            Prefix::IPV6(p) => self
                .v6
                .get_lpm_mut(&p)
                .map(|(p, v)| (Prefix::IPV6(*p), v)),
        }
    }

    /// Longest prefix covering `addr`
    pub fn lookup_addr(&self, addr: IpAddr) -> Option<(Prefix, &V)> {
        self.lookup(Prefix::host(addr))
    }

    /// Number of prefixes, both families
    #[must_use]
    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// True if no prefix is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, IPv4 first.
    pub fn iter(&self) -> impl Iterator<Item = (Prefix, &V)> {
        self.v4
            .iter()
            .map(|(p, v)| (Prefix::IPV4(*p), v))
            .chain(self.v6.iter().map(|(p, v)| (Prefix::IPV6(*p), v)))
    }
}

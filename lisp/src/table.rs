// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Longest prefix match table keyed by [`EidKey`]

use crate::mapping::EidKey;
use lpm::sg::SgTrie;
use lpm::trie::IpPrefixTrie;

/// Unicast prefixes and multicast (source, group) pairs live in separate tries.
#[derive(Debug, Clone)]
pub(crate) struct EidTable<V> {
    ip: IpPrefixTrie<V>,
    sg: SgTrie<V>,
}

impl<V> Default for EidTable<V> {
    fn default() -> Self {
        Self {
            ip: IpPrefixTrie::new(),
            sg: SgTrie::new(),
        }
    }
}

impl<V> EidTable<V> {
    pub(crate) fn insert(&mut self, key: EidKey, value: V) -> Option<V> {
        match key {
            EidKey::Ip(prefix) => self.ip.insert(prefix, value),
            EidKey::Sg { source, group } => self.sg.insert(source, group, value),
        }
    }

    pub(crate) fn remove(&mut self, key: &EidKey) -> Option<V> {
        match key {
            EidKey::Ip(prefix) => self.ip.remove(prefix),
            EidKey::Sg { source, group } => self.sg.remove(source, group),
        }
    }

    pub(crate) fn get(&self, key: &EidKey) -> Option<&V> {
        match key {
            EidKey::Ip(prefix) => self.ip.get(prefix),
            EidKey::Sg { source, group } => self.sg.get(source, group),
        }
    }

    pub(crate) fn get_mut(&mut self, key: &EidKey) -> Option<&mut V> {
        match key {
            EidKey::Ip(prefix) => self.ip.get_mut(prefix),
            EidKey::Sg { source, group } => self.sg.get_mut(source, group),
        }
    }

    pub(crate) fn lookup(&self, key: &EidKey) -> Option<(EidKey, &V)> {
        match key {
            EidKey::Ip(prefix) => self
                .ip
                .lookup(*prefix)
                .map(|(prefix, v)| (EidKey::Ip(prefix), v)),
            EidKey::Sg { source, group } => self
                .sg
                .lookup(*source, *group)
                .map(|((source, group), v)| (EidKey::Sg { source, group }, v)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.ip.len() + self.sg.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EidKey, &V)> {
        self.ip
            .iter()
            .map(|(prefix, v)| (EidKey::Ip(prefix), v))
            .chain(
                self.sg
                    .iter()
                    .map(|((source, group), v)| (EidKey::Sg { source, group }, v)),
            )
    }
}

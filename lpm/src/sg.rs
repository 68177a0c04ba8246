// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Table keyed by multicast (source, group) prefix pairs.

use crate::prefix::Prefix;
use crate::trie::IpPrefixTrie;

/// A map from (source, group) prefixes to `V`.
///
/// Lookups do a longest prefix match on the group first, then on the source among the
/// entries of that group. Both must match.
#[derive(Debug, Clone)]
pub struct SgTrie<V> {
    groups: IpPrefixTrie<IpPrefixTrie<V>>,
}

impl<V> Default for SgTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SgTrie<V> {
    /// An empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: IpPrefixTrie::new(),
        }
    }

    /// Insert `value` at exactly (`source`, `group`).
    pub fn insert(&mut self, source: Prefix, group: Prefix, value: V) -> Option<V> {
        if let Some(sources) = self.groups.get_mut(&group) {
            return sources.insert(source, value);
        }
        let mut sources = IpPrefixTrie::new();
        sources.insert(source, value);
        self.groups.insert(group, sources);
        None
    }

    /// Remove the value at exactly (`source`, `group`).
    pub fn remove(&mut self, source: &Prefix, group: &Prefix) -> Option<V> {
        let sources = self.groups.get_mut(group)?;
        let removed = sources.remove(source);
        if sources.is_empty() {
            self.groups.remove(group);
        }
        removed
    }

    /// Get the value at exactly (`source`, `group`).
    #[must_use]
    pub fn get(&self, source: &Prefix, group: &Prefix) -> Option<&V> {
        self.groups.get(group)?.get(source)
    }

    /// Get the value at exactly (`source`, `group`).
    pub fn get_mut(&mut self, source: &Prefix, group: &Prefix) -> Option<&mut V> {
        self.groups.get_mut(group)?.get_mut(source)
    }

    /// Longest match on the group, then on the source.
    pub fn lookup<S: Into<Prefix>, G: Into<Prefix>>(
        &self,
        source: S,
        group: G,
    ) -> Option<((Prefix, Prefix), &V)> {
        let (gp, sources) = self.groups.lookup(group)?;
        let (sp, value) = sources.lookup(source)?;
        Some(((sp, gp), value))
    }

    /// Longest match on the group, then on the source.
    pub fn lookup_mut<S: Into<Prefix>, G: Into<Prefix>>(
        &mut self,
        source: S,
        group: G,
    ) -> Option<((Prefix, Prefix), &mut V)> {
        let (gp, sources) = self.groups.lookup_mut(group)?;
        let (sp, value) = sources.lookup_mut(source)?;
        Some(((sp, gp), value))
    }

    /// Number of (source, group) entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, sources)| sources.len()).sum()
    }

    /// True if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All entries as ((source, group), value)
    pub fn iter(&self) -> impl Iterator<Item = ((Prefix, Prefix), &V)> {
        self.groups.iter().flat_map(|(group, sources)| {
            sources
                .iter()
                .map(move |(source, value)| ((source, group), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::prefix::Prefix;
    use crate::sg::SgTrie;
    use std::str::FromStr;

    fn pfx(s: &str) -> Prefix {
        Prefix::from_str(s).unwrap()
    }

    #[test]
    fn both_source_and_group_must_match() {
        let mut sg = SgTrie::new();
        sg.insert(pfx("10.0.0.0/8"), pfx("239.1.1.0/24"), "a");
        sg.insert(pfx("0.0.0.0/0"), pfx("239.0.0.0/8"), "any");
        assert_eq!(sg.len(), 2);

        let ((s, g), v) = sg.lookup(pfx("10.1.2.3"), pfx("239.1.1.7")).unwrap();
        assert_eq!((s, g, *v), (pfx("10.0.0.0/8"), pfx("239.1.1.0/24"), "a"));
        let (_, v) = sg.lookup(pfx("192.0.2.1"), pfx("239.2.0.1")).unwrap();
        assert_eq!(*v, "any");
        // the longest group has no matching source
        assert!(sg.lookup(pfx("192.0.2.1"), pfx("239.1.1.7")).is_none());
        assert!(sg.lookup(pfx("10.1.2.3"), pfx("224.0.0.1")).is_none());
    }

    #[test]
    fn removal_prunes_empty_groups() {
        let mut sg = SgTrie::new();
        sg.insert(pfx("10.0.0.1"), pfx("239.1.1.1"), 1);
        assert_eq!(sg.insert(pfx("10.0.0.1"), pfx("239.1.1.1"), 2), Some(1));
        if let Some((_, v)) = sg.lookup_mut(pfx("10.0.0.1"), pfx("239.1.1.1")) {
            *v += 1;
        }
        assert_eq!(sg.get(&pfx("10.0.0.1"), &pfx("239.1.1.1")), Some(&3));
        assert_eq!(sg.remove(&pfx("10.0.0.1"), &pfx("239.1.1.1")), Some(3));
        assert!(sg.is_empty());
        assert_eq!(sg.iter().count(), 0);
    }
}

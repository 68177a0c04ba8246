// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The local mapping database: the EID prefixes this node is authoritative for.

use crate::mapping::{EidKey, Mapping};
use crate::table::EidTable;
use std::net::IpAddr;
use tracing::debug;

use tracectl::trace_target;
trace_target!("local-db", LevelFilter::INFO, &["lisp", "control"]);

#[derive(Debug, Clone, Default)]
pub struct LocalDb {
    mappings: EidTable<Mapping>,
}

impl LocalDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping, returning the one it replaces.
    pub fn add(&mut self, mapping: Mapping) -> Option<Mapping> {
        debug!("Adding local mapping {mapping}");
        self.mappings.insert(*mapping.eid(), mapping)
    }

    pub fn remove(&mut self, eid: &EidKey) -> Option<Mapping> {
        self.mappings.remove(eid)
    }

    /// The mapping whose prefix most specifically covers `eid`
    #[must_use]
    pub fn lookup(&self, eid: &EidKey) -> Option<&Mapping> {
        self.mappings.lookup(eid).map(|(_, mapping)| mapping)
    }

    /// The mapping covering a host address
    #[must_use]
    pub fn lookup_addr(&self, addr: IpAddr) -> Option<&Mapping> {
        self.lookup(&EidKey::from(addr))
    }

    /// The mapping registered for exactly `eid`
    #[must_use]
    pub fn get(&self, eid: &EidKey) -> Option<&Mapping> {
        self.mappings.get(eid)
    }

    pub fn get_mut(&mut self, eid: &EidKey) -> Option<&mut Mapping> {
        self.mappings.get_mut(eid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter().map(|(_, mapping)| mapping)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use crate::database::LocalDb;
    use crate::locator::Locator;
    use crate::mapping::{EidKey, Mapping};
    use lpm::prefix::Prefix;
    use std::net::IpAddr;
    use std::str::FromStr;

    fn mapping(prefix: &str, rloc: [u8; 4]) -> Mapping {
        Mapping::new(Prefix::from_str(prefix).unwrap())
            .with_locator(Locator::new(IpAddr::from(rloc), 1, 100).unwrap())
    }

    #[test]
    fn covering_lookup() {
        let mut db = LocalDb::new();
        db.add(mapping("10.0.0.0/16", [192, 0, 2, 1]));
        db.add(mapping("10.0.1.0/24", [192, 0, 2, 2]));
        assert_eq!(db.len(), 2);

        let found = db.lookup_addr(IpAddr::from([10, 0, 1, 9])).unwrap();
        assert_eq!(found.eid().to_string(), "10.0.1.0/24");
        let found = db
            .lookup(&EidKey::Ip(Prefix::from_str("10.0.2.0/24").unwrap()))
            .unwrap();
        assert_eq!(found.eid().to_string(), "10.0.0.0/16");
        assert!(db.lookup_addr(IpAddr::from([10, 1, 0, 1])).is_none());
        assert!(db.lookup_addr(IpAddr::from_str("2001:db8::1").unwrap()).is_none());

        let key = *found.eid();
        assert!(db.get_mut(&key).is_some());
        assert!(db.remove(&key).is_some());
        assert_eq!(db.iter().count(), 1);
    }
}

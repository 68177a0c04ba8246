// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! EID prefixes and their mappings to locators

use crate::errors::MappingError;
use crate::locator::Locator;
use lpm::prefix::Prefix;
use net::ip::Afi;
use net::tuple::PacketTuple;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// The key of a mapping: a unicast EID prefix or a multicast (source, group) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EidKey {
    Ip(Prefix),
    Sg { source: Prefix, group: Prefix },
}

impl EidKey {
    /// Key of a multicast channel.
    ///
    /// # Errors
    ///
    /// Fails if source and group are of different families.
    pub fn sg(source: Prefix, group: Prefix) -> Result<EidKey, MappingError> {
        if source.is_ipv4() != group.is_ipv4() {
            return Err(MappingError::MixedSg(
                source.as_address(),
                group.as_address(),
            ));
        }
        Ok(EidKey::Sg { source, group })
    }

    /// The key to look up when forwarding a packet: (S,G) host key for multicast
    /// destinations, the destination host prefix otherwise.
    #[must_use]
    pub fn of_tuple(tuple: &PacketTuple) -> EidKey {
        if tuple.dst().is_multicast() {
            EidKey::Sg {
                source: Prefix::host(tuple.src()),
                group: Prefix::host(tuple.dst()),
            }
        } else {
            EidKey::Ip(Prefix::host(tuple.dst()))
        }
    }

    #[must_use]
    pub fn afi(&self) -> Afi {
        let prefix = match self {
            EidKey::Ip(prefix) | EidKey::Sg { group: prefix, .. } => prefix,
        };
        Afi::of(&prefix.as_address())
    }

    #[must_use]
    pub fn is_multicast(&self) -> bool {
        matches!(self, EidKey::Sg { .. })
    }

    /// True if this key covers `other`
    #[must_use]
    pub fn covers(&self, other: &EidKey) -> bool {
        match (self, other) {
            (EidKey::Ip(a), EidKey::Ip(b)) => a.covers(b),
            (
                EidKey::Sg { source, group },
                EidKey::Sg {
                    source: os,
                    group: og,
                },
            ) => source.covers(os) && group.covers(og),
            _ => false,
        }
    }
}

impl From<Prefix> for EidKey {
    fn from(prefix: Prefix) -> Self {
        EidKey::Ip(prefix)
    }
}

impl From<IpAddr> for EidKey {
    fn from(addr: IpAddr) -> Self {
        EidKey::Ip(Prefix::host(addr))
    }
}

impl Display for EidKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EidKey::Ip(prefix) => write!(f, "{prefix}"),
            EidKey::Sg { source, group } => write!(f, "({source}, {group})"),
        }
    }
}

/// An EID prefix and the locators it can be reached at.
///
/// Locators are kept per family, sorted by priority then address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    eid: EidKey,
    instance_id: u32,
    v4: Vec<Locator>,
    v6: Vec<Locator>,
}

impl Mapping {
    #[must_use]
    pub fn new(eid: impl Into<EidKey>) -> Self {
        Self {
            eid: eid.into(),
            instance_id: 0,
            v4: Vec::new(),
            v6: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_instance_id(mut self, instance_id: u32) -> Self {
        self.instance_id = instance_id;
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.add_locator(locator);
        self
    }

    /// The same locators under another EID.
    #[must_use]
    pub fn with_eid(&self, eid: EidKey) -> Self {
        Self {
            eid,
            ..self.clone()
        }
    }

    /// Add a locator, replacing any locator with the same address.
    pub fn add_locator(&mut self, locator: Locator) -> Option<Locator> {
        let replaced = self.remove_locator(locator.addr());
        let list = self.family_mut(locator.afi());
        let pos = list.partition_point(|l| (l.priority(), l.addr()) < (locator.priority(), locator.addr()));
        list.insert(pos, locator);
        replaced
    }

    pub fn remove_locator(&mut self, addr: IpAddr) -> Option<Locator> {
        let list = self.family_mut(Afi::of(&addr));
        let pos = list.iter().position(|l| l.addr() == addr)?;
        Some(list.remove(pos))
    }

    pub fn locator_mut(&mut self, addr: IpAddr) -> Option<&mut Locator> {
        self.family_mut(Afi::of(&addr))
            .iter_mut()
            .find(|l| l.addr() == addr)
    }

    fn family_mut(&mut self, afi: Afi) -> &mut Vec<Locator> {
        match afi {
            Afi::Ipv4 => &mut self.v4,
            Afi::Ipv6 => &mut self.v6,
        }
    }

    #[must_use]
    pub fn eid(&self) -> &EidKey {
        &self.eid
    }

    #[must_use]
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    /// Locators of one family, most preferred first
    #[must_use]
    pub fn locators(&self, afi: Afi) -> &[Locator] {
        match afi {
            Afi::Ipv4 => &self.v4,
            Afi::Ipv6 => &self.v6,
        }
    }

    /// All locators, IPv4 first
    pub fn iter_locators(&self) -> impl Iterator<Item = &Locator> {
        self.v4.iter().chain(self.v6.iter())
    }

    #[must_use]
    pub fn locator_count(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// True if there is no locator at all, as in a negative mapping
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.locator_count() == 0
    }
}

impl Display for Mapping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} iid {} ->", self.eid, self.instance_id)?;
        if self.is_negative() {
            return write!(f, " (no locators)");
        }
        for locator in self.iter_locators() {
            write!(f, " [{locator}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use crate::locator::Locator;
    use crate::mapping::{EidKey, Mapping};
    use lpm::prefix::Prefix;
    use net::ip::Afi;
    use net::tuple::{PROTO_UDP, PacketTuple};
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    fn loc(addr: &str, priority: u8, weight: u8) -> Locator {
        Locator::new(IpAddr::from_str(addr).unwrap(), priority, weight).unwrap()
    }

    #[test]
    fn locators_are_ordered() {
        let mut mapping = Mapping::new(Prefix::from_str("10.0.0.0/24").unwrap())
            .with_locator(loc("192.0.2.9", 2, 10))
            .with_locator(loc("2001:db8::1", 1, 10))
            .with_locator(loc("192.0.2.5", 2, 10))
            .with_locator(loc("192.0.2.7", 1, 10));
        let v4: Vec<_> = mapping.locators(Afi::Ipv4).iter().map(|l| l.addr().to_string()).collect();
        assert_eq!(v4, ["192.0.2.7", "192.0.2.5", "192.0.2.9"]);
        assert_eq!(mapping.locators(Afi::Ipv6).len(), 1);

        let old = mapping.add_locator(loc("192.0.2.9", 0, 50)).unwrap();
        assert_eq!(old.priority(), 2);
        assert_eq!(mapping.locators(Afi::Ipv4)[0].addr().to_string(), "192.0.2.9");
        assert_eq!(mapping.locator_count(), 4);
        mapping.locator_mut(IpAddr::from_str("2001:db8::1").unwrap()).unwrap().set_rtrs(vec![]);
        assert!(mapping.remove_locator(IpAddr::from_str("2001:db8::1").unwrap()).is_some());
        assert!(mapping.locators(Afi::Ipv6).is_empty());
    }

    #[test]
    fn tuple_keys() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let unicast = PacketTuple::v4(src, Ipv4Addr::new(10, 1, 0, 1), 1, 2, PROTO_UDP);
        assert_eq!(
            EidKey::of_tuple(&unicast),
            EidKey::from(IpAddr::from([10, 1, 0, 1]))
        );
        let multicast = PacketTuple::v4(src, Ipv4Addr::new(239, 1, 1, 1), 1, 2, PROTO_UDP);
        let key = EidKey::of_tuple(&multicast);
        assert!(key.is_multicast());
        assert_eq!(key.to_string(), "(10.0.0.1/32, 239.1.1.1/32)");
        let wide = EidKey::sg(
            Prefix::from_str("10.0.0.0/8").unwrap(),
            Prefix::from_str("239.0.0.0/8").unwrap(),
        )
        .unwrap();
        assert!(wide.covers(&key));
        assert!(!key.covers(&wide));
        assert!(
            EidKey::sg(
                Prefix::from_str("10.0.0.0/8").unwrap(),
                Prefix::from_str("ff0e::/16").unwrap()
            )
            .is_err()
        );
    }
}

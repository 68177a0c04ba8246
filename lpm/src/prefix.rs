// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type to represent IP-version neutral network prefixes.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
pub use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("Invalid Prefix: {0}")]
    Invalid(String),
    #[error("Mask length {0} is invalid")]
    InvalidLength(u8),
}

/// Both IPv4 and IPv6 prefixes, with an IP version-independent API.
///
/// Prefixes are always stored truncated: host bits are cleared on construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "IpNet", into = "IpNet")]
pub enum Prefix {
    IPV4(Ipv4Net),
    IPV6(Ipv6Net),
}

impl Prefix {
    pub const MAX_LEN_IPV4: u8 = 32;
    pub const MAX_LEN_IPV6: u8 = 128;

    /// Build a prefix of length `len` covering `addr`.
    ///
    /// # Errors
    ///
    /// Fails if `len` exceeds the address length.
    pub fn new(addr: IpAddr, len: u8) -> Result<Prefix, PrefixError> {
        let net = IpNet::new(addr, len).map_err(|_| PrefixError::InvalidLength(len))?;
        Ok(Prefix::from(net))
    }

    /// The host prefix (/32 or /128) of an address.
    #[must_use]
    pub fn host(addr: IpAddr) -> Prefix {
        Prefix::from(IpNet::from(addr))
    }

    /// Build 0.0.0.0/0.
    #[must_use]
    pub fn root_v4() -> Prefix {
        Prefix::IPV4(Ipv4Net::default())
    }

    /// Build `::/0`.
    #[must_use]
    pub fn root_v6() -> Prefix {
        Prefix::IPV6(Ipv6Net::default())
    }

    /// Check whether the prefix is IPv4
    #[must_use]
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Prefix::IPV4(_))
    }

    /// Check whether the prefix is IPv6
    #[must_use]
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Prefix::IPV6(_))
    }

    /// The network address of the prefix
    #[must_use]
    pub fn as_address(&self) -> IpAddr {
        match self {
            Prefix::IPV4(p) => p.network().into(),
            Prefix::IPV6(p) => p.network().into(),
        }
    }

    /// Get prefix length
    #[must_use]
    pub fn length(&self) -> u8 {
        match self {
            Prefix::IPV4(p) => p.prefix_len(),
            Prefix::IPV6(p) => p.prefix_len(),
        }
    }

    /// Check whether prefix covers a given address
    #[must_use]
    pub fn covers_addr(&self, addr: &IpAddr) -> bool {
        match (self, addr) {
            (Prefix::IPV4(p), IpAddr::V4(a)) => p.contains(a),
            (Prefix::IPV6(p), IpAddr::V6(a)) => p.contains(a),
            _ => false,
        }
    }

    /// Check whether prefix covers another prefix
    #[must_use]
    pub fn covers(&self, other: &Prefix) -> bool {
        match (self, other) {
            (Prefix::IPV4(p1), Prefix::IPV4(p2)) => p1.contains(p2),
            (Prefix::IPV6(p1), Prefix::IPV6(p2)) => p1.contains(p2),
            _ => false,
        }
    }

    /// Check whether the prefix is within multicast address space
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.as_address().is_multicast()
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        match net.trunc() {
            IpNet::V4(p) => Prefix::IPV4(p),
            IpNet::V6(p) => Prefix::IPV6(p),
        }
    }
}

impl From<Prefix> for IpNet {
    fn from(prefix: Prefix) -> Self {
        match prefix {
            Prefix::IPV4(p) => IpNet::V4(p),
            Prefix::IPV6(p) => IpNet::V6(p),
        }
    }
}

impl From<IpAddr> for Prefix {
    fn from(addr: IpAddr) -> Self {
        Prefix::host(addr)
    }
}

impl FromStr for Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(net) = IpNet::from_str(s) {
            return Ok(Prefix::from(net));
        }
        IpAddr::from_str(s)
            .map(Prefix::host)
            .map_err(|_| PrefixError::Invalid(s.to_string()))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prefix::IPV4(p) => write!(f, "{p}"),
            Prefix::IPV6(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_bits_are_cleared() {
        let prefix = Prefix::new(IpAddr::from([10, 0, 0, 5]), 24).unwrap();
        assert_eq!(prefix.to_string(), "10.0.0.0/24");
        assert_eq!(prefix, Prefix::from_str("10.0.0.77/24").unwrap());
        assert!(prefix.covers_addr(&IpAddr::from([10, 0, 0, 200])));
        assert!(!prefix.covers_addr(&IpAddr::from([10, 0, 1, 0])));
    }

    #[test]
    fn bad_lengths_are_refused() {
        assert_eq!(
            Prefix::new(IpAddr::from([10, 0, 0, 0]), 33),
            Err(PrefixError::InvalidLength(33))
        );
        assert!(Prefix::new(IpAddr::from([0u8; 16]), 128).is_ok());
        assert!(Prefix::from_str("10.0.0.0/40").is_err());
    }

    #[test]
    fn bare_addresses_are_hosts() {
        let prefix = Prefix::from_str("2001:db8::1").unwrap();
        assert_eq!(prefix.length(), 128);
        assert!(prefix.is_ipv6());
    }

    #[test]
    fn serde_as_string() {
        let prefix: Prefix = serde_yaml_ng::from_str("\"192.0.2.0/24\"").unwrap();
        assert_eq!(prefix.length(), 24);
        let back = serde_yaml_ng::to_string(&prefix).unwrap();
        assert_eq!(back.trim(), "192.0.2.0/24");
    }

    #[test]
    fn covering() {
        let wide = Prefix::from_str("10.0.0.0/8").unwrap();
        let narrow = Prefix::from_str("10.1.0.0/16").unwrap();
        assert!(wide.covers(&narrow));
        assert!(!narrow.covers(&wide));
        assert!(!wide.covers(&Prefix::root_v6()));
        assert!(Prefix::from_str("ff0e::/16").unwrap().is_multicast());
    }
}

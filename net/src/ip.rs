// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address families and the IP headers used as outer headers of tunneled packets

use crate::ipv4::Ipv4;
use crate::ipv6::Ipv6;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// IANA address family number for IPv4
pub const IANA_AFI_IPV4: u16 = 1;
/// IANA address family number for IPv6
pub const IANA_AFI_IPV6: u16 = 2;
/// IANA address family number for distinguished names
pub const IANA_AFI_DISTINGUISHED_NAME: u16 = 17;
/// Address family number of the LISP Canonical Address Format
pub const IANA_AFI_LCAF: u16 = 16387;

/// IP address family
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl Afi {
    /// The family of an address
    #[must_use]
    pub const fn of(addr: &IpAddr) -> Afi {
        match addr {
            IpAddr::V4(_) => Afi::Ipv4,
            IpAddr::V6(_) => Afi::Ipv6,
        }
    }

    /// The other family
    #[must_use]
    pub const fn other(self) -> Afi {
        match self {
            Afi::Ipv4 => Afi::Ipv6,
            Afi::Ipv6 => Afi::Ipv4,
        }
    }

    /// The IANA address family number
    #[must_use]
    pub const fn iana(self) -> u16 {
        match self {
            Afi::Ipv4 => IANA_AFI_IPV4,
            Afi::Ipv6 => IANA_AFI_IPV6,
        }
    }

    /// Map an IANA address family number to an IP family
    #[must_use]
    pub const fn from_iana(afi: u16) -> Option<Afi> {
        match afi {
            IANA_AFI_IPV4 => Some(Afi::Ipv4),
            IANA_AFI_IPV6 => Some(Afi::Ipv6),
            _ => None,
        }
    }

    /// Length of an address of this family, in bytes
    #[must_use]
    pub const fn addr_len(self) -> usize {
        match self {
            Afi::Ipv4 => 4,
            Afi::Ipv6 => 16,
        }
    }

    /// Length of the longest prefix of this family
    #[must_use]
    pub const fn max_prefix_len(self) -> u8 {
        match self {
            Afi::Ipv4 => 32,
            Afi::Ipv6 => 128,
        }
    }
}

impl Display for Afi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Afi::Ipv4 => write!(f, "ipv4"),
            Afi::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// An outer network header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Net {
    /// IPv4 header
    Ipv4(Ipv4),
    /// IPv6 header
    Ipv6(Ipv6),
}

impl Net {
    /// Length of the header on the wire
    #[must_use]
    pub fn header_len(&self) -> usize {
        match self {
            Net::Ipv4(ip) => ip.header_len(),
            Net::Ipv6(_) => Ipv6::HEADER_LEN,
        }
    }

    /// Append the header to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Net::Ipv4(ip) => ip.write_to(out),
            Net::Ipv6(ip) => ip.write_to(out),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::ip::Afi;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn iana_numbers_round_trip() {
        bolero::check!().with_type().for_each(|afi: &Afi| {
            assert_eq!(Afi::from_iana(afi.iana()), Some(*afi));
            assert_ne!(afi.other(), *afi);
        });
        assert_eq!(Afi::from_iana(0), None);
        assert_eq!(Afi::from_iana(16387), None);
    }

    #[test]
    fn family_of_address() {
        assert_eq!(Afi::of(&IpAddr::V4(Ipv4Addr::LOCALHOST)), Afi::Ipv4);
        assert_eq!(Afi::of(&IpAddr::V6(Ipv6Addr::LOCALHOST)), Afi::Ipv6);
    }
}

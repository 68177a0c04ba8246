// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP checksum type and methods

use crate::checksum::Checksum;
use crate::ip::Net;
use crate::udp::{Udp, UdpError};
use std::fmt::{Display, Formatter};

/// A [`Udp`] checksum
#[repr(transparent)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct UdpChecksum(pub(crate) u16);

impl UdpChecksum {
    /// The checksum of a UDP datagram over IPv4 which opted out of checksumming.
    pub const ZERO: Self = Self(0);
}

impl Display for UdpChecksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl From<UdpChecksum> for u16 {
    fn from(checksum: UdpChecksum) -> Self {
        checksum.0
    }
}

/// The payload over which a UDP checksum is computed.
pub struct UdpChecksumPayload<'a> {
    net: &'a Net,
    contents: &'a [u8],
}

impl<'a> UdpChecksumPayload<'a> {
    /// Assemble a new UDP checksum payload.
    #[must_use]
    pub fn new(net: &'a Net, contents: &'a [u8]) -> Self {
        Self { net, contents }
    }
}

impl Checksum for Udp {
    type Error = UdpError;
    type Payload<'a>
        = UdpChecksumPayload<'a>
    where
        Self: 'a;
    type Checksum = UdpChecksum;

    fn checksum(&self) -> UdpChecksum {
        UdpChecksum(self.0.checksum)
    }

    fn compute_checksum(&self, payload: &UdpChecksumPayload<'_>) -> Result<UdpChecksum, UdpError> {
        let too_large = |_| UdpError::PayloadTooLarge(payload.contents.len());
        let raw = match payload.net {
            Net::Ipv4(ip) => self.0.calc_checksum_ipv4(&ip.0, payload.contents),
            Net::Ipv6(ip) => self.0.calc_checksum_ipv6(&ip.0, payload.contents),
        }
        .map_err(too_large)?;
        Ok(UdpChecksum(raw))
    }

    fn set_checksum(&mut self, checksum: UdpChecksum) -> &mut Self {
        self.0.checksum = checksum.0;
        self
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 outer header

use crate::checksum::Checksum;
use etherparse::{IpDscp, IpEcn, IpNumber, Ipv4Header};
use std::net::Ipv4Addr;

/// An IPv4 header
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ipv4(pub(crate) Ipv4Header);

/// Errors which may occur when building an [`Ipv4`] header.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Error {
    /// The payload does not fit in the total length field.
    #[error("payload of {0} bytes is too large for IPv4")]
    PayloadTooLarge(usize),
}

impl Ipv4 {
    /// Build the header of a datagram carrying `payload_len` bytes of `protocol`.
    ///
    /// The header has no options, the don't fragment bit set and a zero identification.
    /// The header checksum is left at zero.
    ///
    /// # Errors
    ///
    /// Returns [`Ipv4Error::PayloadTooLarge`] if the total length overflows.
    pub fn new(
        source: Ipv4Addr,
        destination: Ipv4Addr,
        protocol: IpNumber,
        payload_len: usize,
    ) -> Result<Ipv4, Ipv4Error> {
        let payload = u16::try_from(payload_len)
            .map_err(|_| Ipv4Error::PayloadTooLarge(payload_len))?;
        let mut header = Ipv4Header::new(payload, 64, protocol, source.octets(), destination.octets())
            .map_err(|_| Ipv4Error::PayloadTooLarge(payload_len))?;
        header.identification = 0;
        header.dont_fragment = true;
        header.header_checksum = 0;
        Ok(Ipv4(header))
    }

    /// Time to live
    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.0.time_to_live
    }

    /// Set the time to live
    pub fn set_ttl(&mut self, ttl: u8) -> &mut Self {
        self.0.time_to_live = ttl;
        self
    }

    /// The type of service byte (DSCP and ECN)
    #[must_use]
    pub fn tos(&self) -> u8 {
        (self.0.dscp.value() << 2) | self.0.ecn.value()
    }

    /// Set the type of service byte (DSCP and ECN)
    pub fn set_tos(&mut self, tos: u8) -> &mut Self {
        // both conversions are in range after the shift and the mask
        if let Ok(dscp) = IpDscp::try_new(tos >> 2) {
            self.0.dscp = dscp;
        }
        if let Ok(ecn) = IpEcn::try_new(tos & 0b11) {
            self.0.ecn = ecn;
        }
        self
    }

    /// Source address
    #[must_use]
    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.0.source)
    }

    /// Destination address
    #[must_use]
    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.0.destination)
    }

    /// Length of the header on the wire
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.0.header_len()
    }

    /// Append the header to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_bytes());
    }
}

impl Checksum for Ipv4 {
    type Error = ();
    type Payload<'a> = ();
    type Checksum = u16;

    fn checksum(&self) -> u16 {
        self.0.header_checksum
    }

    /// The IPv4 checksum covers the header only.
    fn compute_checksum(&self, (): &()) -> Result<u16, ()> {
        Ok(self.0.calc_header_checksum())
    }

    fn set_checksum(&mut self, checksum: u16) -> &mut Self {
        self.0.header_checksum = checksum;
        self
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::checksum::Checksum;
    use crate::ipv4::{Ipv4, Ipv4Error};
    use etherparse::{IpNumber, Ipv4HeaderSlice};
    use std::net::Ipv4Addr;

    #[test]
    fn tos_is_kept_whole() {
        bolero::check!().with_type().for_each(|tos: &u8| {
            let mut ip = Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::BROADCAST, IpNumber::UDP, 0)
                .unwrap();
            ip.set_tos(*tos);
            assert_eq!(ip.tos(), *tos);
        });
    }

    #[test]
    fn checksum_validates_in_a_parser() {
        let mut ip = Ipv4::new(
            Ipv4Addr::new(192, 0, 2, 1),
            Ipv4Addr::new(198, 51, 100, 7),
            IpNumber::UDP,
            100,
        )
        .unwrap();
        ip.set_ttl(17).update_checksum(&()).unwrap();
        let mut bytes = vec![];
        ip.write_to(&mut bytes);
        let slice = Ipv4HeaderSlice::from_slice(&bytes).unwrap();
        assert_eq!(slice.header_checksum(), ip.checksum());
        assert_eq!(slice.to_header().calc_header_checksum(), ip.checksum());
        assert!(slice.dont_fragment());
        assert_eq!(slice.identification(), 0);
        assert_eq!(slice.total_len(), 120);
        assert_eq!(slice.ttl(), 17);
    }

    #[test]
    fn oversize_payload_is_refused() {
        let err = Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, IpNumber::UDP, 65_516)
            .unwrap_err();
        assert_eq!(err, Ipv4Error::PayloadTooLarge(65_516));
    }
}

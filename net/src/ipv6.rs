// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv6 outer header

use etherparse::{IpNumber, Ipv6FlowLabel, Ipv6Header};
use std::net::Ipv6Addr;

/// An IPv6 header (no extension headers)
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ipv6(pub(crate) Ipv6Header);

/// Errors which may occur when building an [`Ipv6`] header.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Ipv6Error {
    /// The payload does not fit in the payload length field.
    #[error("payload of {0} bytes is too large for IPv6")]
    PayloadTooLarge(usize),
}

impl Ipv6 {
    /// Length of the fixed IPv6 header
    pub const HEADER_LEN: usize = Ipv6Header::LEN;

    /// Build the header of a datagram carrying `payload_len` bytes of `next_header`.
    ///
    /// # Errors
    ///
    /// Returns [`Ipv6Error::PayloadTooLarge`] if the payload length overflows (no jumbograms).
    pub fn new(
        source: Ipv6Addr,
        destination: Ipv6Addr,
        next_header: IpNumber,
        payload_len: usize,
    ) -> Result<Ipv6, Ipv6Error> {
        let payload_length =
            u16::try_from(payload_len).map_err(|_| Ipv6Error::PayloadTooLarge(payload_len))?;
        Ok(Ipv6(Ipv6Header {
            traffic_class: 0,
            flow_label: Ipv6FlowLabel::ZERO,
            payload_length,
            next_header,
            hop_limit: 64,
            source: source.octets(),
            destination: destination.octets(),
        }))
    }

    /// Hop limit
    #[must_use]
    pub fn hop_limit(&self) -> u8 {
        self.0.hop_limit
    }

    /// Set the hop limit
    pub fn set_hop_limit(&mut self, hop_limit: u8) -> &mut Self {
        self.0.hop_limit = hop_limit;
        self
    }

    /// Traffic class
    #[must_use]
    pub fn traffic_class(&self) -> u8 {
        self.0.traffic_class
    }

    /// Set the traffic class
    pub fn set_traffic_class(&mut self, traffic_class: u8) -> &mut Self {
        self.0.traffic_class = traffic_class;
        self
    }

    /// Source address
    #[must_use]
    pub fn source(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.0.source)
    }

    /// Destination address
    #[must_use]
    pub fn destination(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.0.destination)
    }

    /// Append the header to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_bytes());
    }
}

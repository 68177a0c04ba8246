// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! LISP encapsulation: outer IP, UDP and LISP headers around an inner IP packet.

use crate::checksum::Checksum;
use crate::ip::Net;
use crate::ipv4::Ipv4;
use crate::ipv6::Ipv6;
use crate::lisp::LispHeader;
use crate::parse::DeParse;
use crate::tuple::{ClassifyError, inner_qos};
use crate::udp::{Udp, UdpChecksumPayload, UdpPort};
use etherparse::IpNumber;
use std::net::IpAddr;
use tracing::debug;

/// Bytes added in front of the inner packet with an IPv4 outer header
pub const IPV4_OVERHEAD: usize = 20 + Udp::HEADER_LEN + LispHeader::LENGTH.get();
/// Bytes added in front of the inner packet with an IPv6 outer header
pub const IPV6_OVERHEAD: usize = Ipv6::HEADER_LEN + Udp::HEADER_LEN + LispHeader::LENGTH.get();

/// Errors which may occur while encapsulating a packet.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum EncapError {
    /// The outer addresses are of different families.
    #[error("outer source {0} and destination {1} are of different address families")]
    MixedFamilies(IpAddr, IpAddr),
    /// The inner packet is not a well formed IP packet.
    #[error("bad inner packet: {0}")]
    Inner(#[from] ClassifyError),
    /// The encapsulated packet would overflow a length field.
    #[error("packet of {0} bytes is too large to encapsulate")]
    TooLarge(usize),
    /// The buffer for the encapsulated packet could not be allocated.
    #[error("failed to allocate {0} bytes for the encapsulated packet")]
    Allocation(usize),
}

/// Parameters of a LISP encapsulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LispEncap {
    src: IpAddr,
    dst: IpAddr,
    src_port: UdpPort,
    dst_port: UdpPort,
    instance_id: u32,
}

impl LispEncap {
    /// Describe an encapsulation from `src` to `dst`.
    ///
    /// The instance ID is kept but not yet written to the wire: the emitted LISP header always
    /// has all flags cleared and a zero instance ID.
    ///
    /// # Errors
    ///
    /// Returns [`EncapError::MixedFamilies`] if `src` and `dst` are not of the same family.
    pub fn new(
        src: IpAddr,
        dst: IpAddr,
        src_port: UdpPort,
        dst_port: UdpPort,
        instance_id: u32,
    ) -> Result<LispEncap, EncapError> {
        if src.is_ipv4() != dst.is_ipv4() {
            return Err(EncapError::MixedFamilies(src, dst));
        }
        Ok(LispEncap {
            src,
            dst,
            src_port,
            dst_port,
            instance_id,
        })
    }

    /// Outer source address
    #[must_use]
    pub fn src(&self) -> IpAddr {
        self.src
    }

    /// Outer destination address
    #[must_use]
    pub fn dst(&self) -> IpAddr {
        self.dst
    }

    /// Instance ID of the inner packet
    #[must_use]
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    /// Bytes this encapsulation adds in front of the inner packet
    #[must_use]
    pub fn overhead(&self) -> usize {
        match self.dst {
            IpAddr::V4(_) => IPV4_OVERHEAD,
            IpAddr::V6(_) => IPV6_OVERHEAD,
        }
    }

    fn outer_ip(&self, payload_len: usize, ttl: u8, tos: u8) -> Result<Net, EncapError> {
        let too_large = EncapError::TooLarge(payload_len);
        match (self.src, self.dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => {
                let mut ip =
                    Ipv4::new(src, dst, IpNumber::UDP, payload_len).map_err(|_| too_large)?;
                ip.set_ttl(ttl).set_tos(tos);
                ip.update_checksum(&()).map_err(|()| too_large)?;
                Ok(Net::Ipv4(ip))
            }
            (IpAddr::V6(src), IpAddr::V6(dst)) => {
                let mut ip =
                    Ipv6::new(src, dst, IpNumber::UDP, payload_len).map_err(|_| too_large)?;
                ip.set_hop_limit(ttl).set_traffic_class(tos);
                Ok(Net::Ipv6(ip))
            }
            (src, dst) => Err(EncapError::MixedFamilies(src, dst)),
        }
    }

    /// Build the encapsulated packet in a freshly allocated buffer.
    ///
    /// TTL and type of service are copied from the inner header. The UDP checksum is zero
    /// over IPv4 and computed over IPv6.
    ///
    /// # Errors
    ///
    /// Fails if the inner packet is not IP, if the result is too large for the outer headers,
    /// or if the buffer cannot be allocated.
    pub fn encapsulate(&self, inner: &[u8]) -> Result<Vec<u8>, EncapError> {
        let qos = inner_qos(inner)?;
        let lisp_len = LispHeader::LENGTH.get() + inner.len();
        let mut udp = Udp::new(self.src_port, self.dst_port, lisp_len)
            .map_err(|_| EncapError::TooLarge(inner.len()))?;
        let net = self.outer_ip(Udp::HEADER_LEN + lisp_len, qos.ttl, qos.tos)?;

        let udp_start = net.header_len();
        let payload_start = udp_start + Udp::HEADER_LEN;
        let total = payload_start + lisp_len;
        let mut out = Vec::new();
        out.try_reserve_exact(total)
            .map_err(|_| EncapError::Allocation(total))?;

        net.write_to(&mut out);
        udp.write_to(&mut out);
        let mut shim = [0u8; LispHeader::LENGTH.get()];
        LispHeader::new()
            .deparse(&mut shim)
            .map_err(|_| EncapError::TooLarge(inner.len()))?;
        out.extend_from_slice(&shim);
        out.extend_from_slice(inner);

        if let Net::Ipv6(_) = net {
            // zero UDP checksums are not allowed over IPv6
            let payload = UdpChecksumPayload::new(&net, &out[payload_start..]);
            udp.update_checksum(&payload)
                .map_err(|_| EncapError::TooLarge(inner.len()))?;
            out[udp_start..payload_start].copy_from_slice(&udp.0.to_bytes());
        }
        debug!(
            "Encapsulated {} bytes {} -> {} (iid {})",
            inner.len(),
            self.src,
            self.dst,
            self.instance_id
        );
        Ok(out)
    }
}

/// Encapsulate `inner` from `src:src_port` to `dst:dst_port`.
///
/// See [`LispEncap::encapsulate`].
///
/// # Errors
///
/// Same as [`LispEncap::new`] and [`LispEncap::encapsulate`].
pub fn encapsulate(
    inner: &[u8],
    src: IpAddr,
    dst: IpAddr,
    src_port: UdpPort,
    dst_port: UdpPort,
    instance_id: u32,
) -> Result<Vec<u8>, EncapError> {
    LispEncap::new(src, dst, src_port, dst_port, instance_id)?.encapsulate(inner)
}

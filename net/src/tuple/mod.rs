// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Classification of inner packets read from the tunnel device.
//!
//! Only the fixed headers are looked at: the IPv4 header length comes from the IHL field
//! and IPv6 is assumed to carry no extension headers.

mod hash;

pub use hash::{FLOW_HASH_SEED, FLOW_KEY_VERSION, FlowKey};

use crate::lisp::{CONTROL_PORT, DATA_PORT};
use crate::parse::LengthError;
use core::num::NonZero;
use etherparse::err::{LenError, ipv4, ipv6, tcp};
use etherparse::{IpNumber, Ipv4HeaderSlice, Ipv6HeaderSlice, TcpHeaderSlice, UdpHeaderSlice};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::trace;

/// IP protocol number of TCP
pub const PROTO_TCP: u8 = IpNumber::TCP.0;
/// IP protocol number of UDP
pub const PROTO_UDP: u8 = IpNumber::UDP.0;

/// Errors which may occur while classifying a packet
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyError {
    /// The version nibble is neither 4 nor 6 (or the buffer is empty).
    #[error("not an IP packet (version {0})")]
    NotIp(u8),
    /// The IPv4 header length field is below the minimum.
    #[error("bad IPv4 header length {0}")]
    BadHeaderLength(u8),
    /// The TCP data offset is below the minimum.
    #[error("bad TCP data offset {0}")]
    BadDataOffset(u8),
    /// The packet is shorter than its headers.
    #[error(transparent)]
    Length(#[from] LengthError),
}

impl ClassifyError {
    // `offset` is where the header being read starts in the packet
    fn truncated(packet: &[u8], offset: usize, err: &LenError) -> ClassifyError {
        ClassifyError::Length(LengthError {
            expected: NonZero::new(offset + err.required_len).unwrap_or(NonZero::<usize>::MIN),
            actual: packet.len(),
        })
    }

    fn ipv4(packet: &[u8], err: ipv4::HeaderSliceError) -> ClassifyError {
        match err {
            ipv4::HeaderSliceError::Len(len) => ClassifyError::truncated(packet, 0, &len),
            ipv4::HeaderSliceError::Content(ipv4::HeaderError::UnexpectedVersion {
                version_number,
            }) => ClassifyError::NotIp(version_number),
            ipv4::HeaderSliceError::Content(ipv4::HeaderError::HeaderLengthSmallerThanHeader {
                ihl,
            }) => ClassifyError::BadHeaderLength(ihl),
        }
    }

    fn ipv6(packet: &[u8], err: ipv6::HeaderSliceError) -> ClassifyError {
        match err {
            ipv6::HeaderSliceError::Len(len) => ClassifyError::truncated(packet, 0, &len),
            ipv6::HeaderSliceError::Content(ipv6::HeaderError::UnexpectedVersion {
                version_number,
            }) => ClassifyError::NotIp(version_number),
        }
    }
}

/// The canonical 5-tuple of a packet.
///
/// Source and destination always share an address family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PacketTuple {
    src: IpAddr,
    dst: IpAddr,
    src_port: u16,
    dst_port: u16,
    protocol: u8,
}

impl PacketTuple {
    /// Build an IPv4 tuple
    #[must_use]
    pub fn v4(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Build an IPv6 tuple
    #[must_use]
    pub fn v6(src: Ipv6Addr, dst: Ipv6Addr, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Source address
    #[must_use]
    pub fn src(&self) -> IpAddr {
        self.src
    }

    /// Destination address
    #[must_use]
    pub fn dst(&self) -> IpAddr {
        self.dst
    }

    /// Source port, zero unless TCP or UDP
    #[must_use]
    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    /// Destination port, zero unless TCP or UDP
    #[must_use]
    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// IP protocol (IPv4) or next header (IPv6)
    #[must_use]
    pub fn protocol(&self) -> u8 {
        self.protocol
    }
}

impl Display for PacketTuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.src {
            IpAddr::V4(_) => write!(
                f,
                "{}:{} -> {}:{} proto {}",
                self.src, self.src_port, self.dst, self.dst_port, self.protocol
            ),
            IpAddr::V6(_) => write!(
                f,
                "[{}]:{} -> [{}]:{} proto {}",
                self.src, self.src_port, self.dst, self.dst_port, self.protocol
            ),
        }
    }
}

/// Quality of service fields a tunnel copies from the inner header to the outer one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InnerQos {
    /// TTL (IPv4) or hop limit (IPv6)
    pub ttl: u8,
    /// Type of service (IPv4) or traffic class (IPv6)
    pub tos: u8,
}

/// The network header of a packet, and where its payload starts
enum NetHeader<'a> {
    V4(Ipv4HeaderSlice<'a>),
    V6(Ipv6HeaderSlice<'a>),
}

impl<'a> NetHeader<'a> {
    fn parse(packet: &'a [u8]) -> Result<NetHeader<'a>, ClassifyError> {
        match packet.first().map(|b| b >> 4) {
            Some(4) => Ipv4HeaderSlice::from_slice(packet)
                .map(NetHeader::V4)
                .map_err(|e| ClassifyError::ipv4(packet, e)),
            Some(6) => Ipv6HeaderSlice::from_slice(packet)
                .map(NetHeader::V6)
                .map_err(|e| ClassifyError::ipv6(packet, e)),
            Some(v) => Err(ClassifyError::NotIp(v)),
            None => Err(ClassifyError::NotIp(0)),
        }
    }

    fn source(&self) -> IpAddr {
        match self {
            NetHeader::V4(ip) => ip.source_addr().into(),
            NetHeader::V6(ip) => ip.source_addr().into(),
        }
    }

    fn destination(&self) -> IpAddr {
        match self {
            NetHeader::V4(ip) => ip.destination_addr().into(),
            NetHeader::V6(ip) => ip.destination_addr().into(),
        }
    }

    // no extension header walk over IPv6
    fn protocol(&self) -> IpNumber {
        match self {
            NetHeader::V4(ip) => ip.protocol(),
            NetHeader::V6(ip) => ip.next_header(),
        }
    }

    fn payload_offset(&self) -> usize {
        match self {
            NetHeader::V4(ip) => ip.slice().len(),
            NetHeader::V6(ip) => ip.slice().len(),
        }
    }
}

fn ports(packet: &[u8], offset: usize, protocol: IpNumber) -> Result<(u16, u16), ClassifyError> {
    let l4 = packet.get(offset..).unwrap_or_default();
    match protocol {
        IpNumber::UDP => {
            let header = UdpHeaderSlice::from_slice(l4)
                .map_err(|e| ClassifyError::truncated(packet, offset, &e))?;
            Ok((header.source_port(), header.destination_port()))
        }
        IpNumber::TCP => {
            let header = TcpHeaderSlice::from_slice(l4).map_err(|e| match e {
                tcp::HeaderSliceError::Len(len) => ClassifyError::truncated(packet, offset, &len),
                tcp::HeaderSliceError::Content(tcp::HeaderError::DataOffsetTooSmall {
                    data_offset,
                }) => ClassifyError::BadDataOffset(data_offset),
            })?;
            Ok((header.source_port(), header.destination_port()))
        }
        _ => Ok((0, 0)),
    }
}

/// Derive the 5-tuple of an IP packet.
///
/// Ports are read for TCP and UDP only; any other protocol yields zero ports.
///
/// # Errors
///
/// Returns [`ClassifyError::NotIp`] for an unknown version and a length error for truncated
/// packets.
pub fn extract_tuple(packet: &[u8]) -> Result<PacketTuple, ClassifyError> {
    let net = NetHeader::parse(packet)?;
    let protocol = net.protocol();
    let (src_port, dst_port) = ports(packet, net.payload_offset(), protocol)?;
    Ok(PacketTuple {
        src: net.source(),
        dst: net.destination(),
        src_port,
        dst_port,
        protocol: protocol.0,
    })
}

/// True iff the packet is UDP to or from a LISP data or control port.
///
/// Such packets are already tunneled (or are control traffic) and must not be encapsulated
/// again.
#[must_use]
pub fn is_lisp_encapsulated(packet: &[u8]) -> bool {
    let Ok(tuple) = extract_tuple(packet) else {
        return false;
    };
    let lisp_ports = [DATA_PORT.as_u16(), CONTROL_PORT.as_u16()];
    let lisp = tuple.protocol == PROTO_UDP
        && (lisp_ports.contains(&tuple.src_port) || lisp_ports.contains(&tuple.dst_port));
    if lisp {
        trace!("LISP packet: {tuple}");
    }
    lisp
}

/// Read the destination address of an IP packet.
///
/// # Errors
///
/// Same as [`extract_tuple`], restricted to the network header.
pub fn destination_address(packet: &[u8]) -> Result<IpAddr, ClassifyError> {
    NetHeader::parse(packet).map(|net| net.destination())
}

/// Read the TTL and type of service (or their IPv6 equivalents) of an IP packet.
///
/// # Errors
///
/// Same as [`destination_address`].
pub fn inner_qos(packet: &[u8]) -> Result<InnerQos, ClassifyError> {
    Ok(match NetHeader::parse(packet)? {
        NetHeader::V4(ip) => InnerQos {
            ttl: ip.ttl(),
            tos: (ip.dcp().value() << 2) | ip.ecn().value(),
        },
        NetHeader::V6(ip) => InnerQos {
            ttl: ip.hop_limit(),
            tos: ip.traffic_class(),
        },
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
pub(crate) mod test {
    use crate::tuple::{
        ClassifyError, InnerQos, PROTO_TCP, PROTO_UDP, PacketTuple, destination_address,
        extract_tuple, inner_qos, is_lisp_encapsulated,
    };
    use etherparse::{IpNumber, Ipv4Header, Ipv6FlowLabel, Ipv6Header, PacketBuilder};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    pub(crate) fn udp4(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ipv4(src, dst, 64).udp(sport, dport);
        let mut out = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut out, payload).unwrap();
        out
    }

    pub(crate) fn udp6(
        src: [u8; 16],
        dst: [u8; 16],
        sport: u16,
        dport: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let builder = PacketBuilder::ipv6(src, dst, 64).udp(sport, dport);
        let mut out = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut out, payload).unwrap();
        out
    }

    #[test]
    fn tcp_and_udp_tuples_are_recovered() {
        bolero::check!()
            .with_type()
            .for_each(|(src, dst, sport, dport, tcp): &([u8; 4], [u8; 4], u16, u16, bool)| {
                let mut packet = Vec::new();
                let ip = PacketBuilder::ipv4(*src, *dst, 12);
                if *tcp {
                    ip.tcp(*sport, *dport, 1, 1024).write(&mut packet, b"hi").unwrap();
                } else {
                    ip.udp(*sport, *dport).write(&mut packet, b"hi").unwrap();
                }
                let tuple = extract_tuple(&packet).unwrap();
                let proto = if *tcp { PROTO_TCP } else { PROTO_UDP };
                let expected =
                    PacketTuple::v4(Ipv4Addr::from(*src), Ipv4Addr::from(*dst), *sport, *dport, proto);
                assert_eq!(tuple, expected);
                assert_eq!(destination_address(&packet).unwrap(), IpAddr::from(*dst));
            });
    }

    #[test]
    fn ipv6_tuples_are_recovered() {
        bolero::check!()
            .with_type()
            .for_each(|(src, dst, sport, dport): &([u8; 16], [u8; 16], u16, u16)| {
                let packet = udp6(*src, *dst, *sport, *dport, &[1, 2, 3]);
                let tuple = extract_tuple(&packet).unwrap();
                assert_eq!(
                    tuple,
                    PacketTuple::v6(Ipv6Addr::from(*src), Ipv6Addr::from(*dst), *sport, *dport, PROTO_UDP)
                );
            });
    }

    #[test]
    fn other_protocols_have_no_ports() {
        let header = Ipv4Header::new(4, 9, IpNumber::ICMP, [10, 0, 0, 1], [10, 0, 0, 2]).unwrap();
        let mut packet = header.to_bytes().to_vec();
        packet.extend_from_slice(&[8, 0, 0, 0]);
        let tuple = extract_tuple(&packet).unwrap();
        assert_eq!(tuple.protocol(), 1);
        assert_eq!((tuple.src_port(), tuple.dst_port()), (0, 0));
    }

    #[test]
    fn ipv4_options_shift_the_ports() {
        let mut packet = udp4([10, 0, 0, 1], [10, 0, 0, 2], 1000, 2000, &[]);
        // grow the header by one word of NOP options
        packet[0] = 0x46;
        packet.splice(20..20, [1u8, 1, 1, 1]);
        let tuple = extract_tuple(&packet).unwrap();
        assert_eq!((tuple.src_port(), tuple.dst_port()), (1000, 2000));
    }

    #[test]
    fn non_ip_is_refused() {
        assert_eq!(extract_tuple(&[]), Err(ClassifyError::NotIp(0)));
        assert_eq!(extract_tuple(&[0x55; 40]), Err(ClassifyError::NotIp(5)));
        assert_eq!(extract_tuple(&[0x44; 40]), Err(ClassifyError::BadHeaderLength(4)));
        assert!(matches!(extract_tuple(&[0x45; 10]), Err(ClassifyError::Length(_))));
        assert!(matches!(extract_tuple(&[0x60; 39]), Err(ClassifyError::Length(_))));
    }

    #[test]
    fn truncated_transport_headers_are_refused() {
        let packet = udp4([10, 0, 0, 1], [10, 0, 0, 2], 1000, 2000, &[]);
        match extract_tuple(&packet[..24]) {
            Err(ClassifyError::Length(e)) => {
                assert_eq!(e.expected().get(), 28);
                assert_eq!(e.actual(), 24);
            }
            other => unreachable!("unexpected {other:?}"),
        }
        // the network header alone is still readable
        assert_eq!(
            destination_address(&packet[..24]).unwrap(),
            IpAddr::from([10, 0, 0, 2])
        );

        let mut tcp = Vec::new();
        PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(1000, 2000, 0, 10)
            .write(&mut tcp, &[])
            .unwrap();
        // data offset of 4 words
        tcp[32] = 0x40;
        assert_eq!(extract_tuple(&tcp), Err(ClassifyError::BadDataOffset(4)));
    }

    #[test]
    fn lisp_ports_are_detected() {
        bolero::check!().with_type().for_each(|(sport, dport): &(u16, u16)| {
            let packet = udp4([10, 0, 0, 1], [10, 0, 0, 2], *sport, *dport, b"x");
            let expected = [4341, 4342].contains(sport) || [4341, 4342].contains(dport);
            assert_eq!(is_lisp_encapsulated(&packet), expected);
        });
        let mut tcp = Vec::new();
        PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(4341, 4342, 0, 10)
            .write(&mut tcp, &[])
            .unwrap();
        assert!(!is_lisp_encapsulated(&tcp));
        assert!(!is_lisp_encapsulated(&[0u8; 3]));
    }

    #[test]
    fn qos_fields_are_read() {
        let mut packet = udp4([10, 0, 0, 1], [10, 0, 0, 2], 1, 2, &[]);
        packet[1] = 0xb8;
        packet[8] = 3;
        assert_eq!(inner_qos(&packet).unwrap(), InnerQos { ttl: 3, tos: 0xb8 });

        let header = Ipv6Header {
            traffic_class: 0x2e,
            flow_label: Ipv6FlowLabel::ZERO,
            payload_length: 0,
            next_header: IpNumber::IPV6_NO_NEXT_HEADER,
            hop_limit: 200,
            source: [1; 16],
            destination: [2; 16],
        };
        let packet = header.to_bytes();
        assert_eq!(inner_qos(&packet).unwrap(), InnerQos { ttl: 200, tos: 0x2e });
    }
}

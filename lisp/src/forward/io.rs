// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! What the output path needs from its surroundings

use crate::locator::SocketKey;
use crate::select::ForwardingEntry;
use net::ip::Afi;
use net::tuple::PacketTuple;
use std::net::IpAddr;

/// Source of the frames to tunnel
pub trait TunDevice {
    /// Read one frame into `buf`, returning its length.
    ///
    /// # Errors
    ///
    /// Any I/O error of the device.
    fn read_frame(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Output sockets, one per (interface, family) of the local locators, plus the sockets
/// used to forward natively.
pub trait SocketTable {
    /// Send an encapsulated packet.
    ///
    /// # Errors
    ///
    /// Any I/O error of the socket.
    fn send(&mut self, socket: &SocketKey, packet: &[u8]) -> std::io::Result<()>;

    /// Send a packet as is.
    ///
    /// # Errors
    ///
    /// Any I/O error of the socket.
    fn send_native(&mut self, afi: Afi, packet: &[u8]) -> std::io::Result<()>;

    /// The socket owning a local address, if any
    fn socket_for(&self, addr: IpAddr) -> Option<SocketKey>;
}

/// One copy of a replicated multicast packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationTarget {
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// Replication lists of the multicast groups this node is a head-end for
pub trait ReplicationResolver {
    /// Outer (source, destination) pairs to send a packet of `source` to `group` to.
    fn resolve_output_rlocs(&self, source: IpAddr, group: IpAddr) -> Vec<ReplicationTarget>;
}

/// Resolves packets to re-encapsulate, in RTR mode
pub trait ReencapResolver {
    fn forwarding_entry(&self, tuple: &PacketTuple) -> Option<ForwardingEntry>;
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP header built around tunneled packets

mod checksum;
mod port;

pub use checksum::{UdpChecksum, UdpChecksumPayload};
pub use port::{UdpPort, UdpPortError};

use etherparse::UdpHeader;

/// A UDP header
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Udp(pub(crate) UdpHeader);

/// Errors which may occur when building a [`Udp`] header.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum UdpError {
    /// The datagram does not fit in the length field.
    #[error("payload of {0} bytes is too large for UDP")]
    PayloadTooLarge(usize),
}

impl Udp {
    /// Length of a UDP header
    pub const HEADER_LEN: usize = UdpHeader::LEN;

    /// Build a header for a datagram carrying `payload_len` bytes, with a zero checksum.
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::PayloadTooLarge`] if the length field overflows.
    pub fn new(source: UdpPort, destination: UdpPort, payload_len: usize) -> Result<Udp, UdpError> {
        let length = Self::HEADER_LEN
            .checked_add(payload_len)
            .and_then(|len| u16::try_from(len).ok())
            .ok_or(UdpError::PayloadTooLarge(payload_len))?;
        Ok(Udp(UdpHeader {
            source_port: source.as_u16(),
            destination_port: destination.as_u16(),
            length,
            checksum: UdpChecksum::ZERO.into(),
        }))
    }

    /// Source port (may be zero on received datagrams)
    #[must_use]
    pub fn source(&self) -> u16 {
        self.0.source_port
    }

    /// Destination port
    #[must_use]
    pub fn destination(&self) -> u16 {
        self.0.destination_port
    }

    /// Length of header and payload
    #[must_use]
    pub fn length(&self) -> u16 {
        self.0.length
    }

    /// Append the header to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_bytes());
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::checksum::Checksum;
    use crate::udp::{Udp, UdpChecksum, UdpError, UdpPort};

    #[test]
    fn new_headers_opt_out_of_checksumming() {
        let port = UdpPort::new_checked(4341).unwrap();
        let udp = Udp::new(port, port, 100).unwrap();
        assert_eq!(udp.checksum(), UdpChecksum::ZERO);
        assert_eq!(udp.length(), 108);
        assert_eq!(
            Udp::new(port, port, usize::from(u16::MAX)),
            Err(UdpError::PayloadTooLarge(usize::from(u16::MAX)))
        );
    }
}

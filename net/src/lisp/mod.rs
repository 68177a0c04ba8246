// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! [LISP][RFC9300] data plane header and control messages.
//!
//! [RFC9300]: https://datatracker.ietf.org/doc/html/rfc9300#section-5

pub mod control;
pub mod encap;

use crate::parse::{DeParse, DeParseError, LengthError, Parse, ParseError};
use crate::udp::UdpPort;
use bitflags::bitflags;
use core::num::NonZero;
use std::convert::Infallible;

/// UDP port of LISP encapsulated data packets.
#[allow(clippy::unwrap_used)] // trivially safe const expression
pub const DATA_PORT: UdpPort = UdpPort::new(NonZero::new(4341).unwrap());

/// UDP port of LISP control messages.
#[allow(clippy::unwrap_used)] // trivially safe const expression
pub const CONTROL_PORT: UdpPort = UdpPort::new(NonZero::new(4342).unwrap());

bitflags! {
    /// Flags of the first byte of a [`LispHeader`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct LispFlags: u8 {
        /// Nonce present
        const N = 0b1000_0000;
        /// Locator status bits enabled
        const L = 0b0100_0000;
        /// Echo nonce request
        const E = 0b0010_0000;
        /// Map-version present
        const V = 0b0001_0000;
        /// Instance ID present
        const I = 0b0000_1000;
    }
}

/// The 8 byte LISP shim header following the outer UDP header.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |N|L|E|V|I|R|K|K|            Nonce/Map-Version                  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                 Instance ID/Locator-Status-Bits               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Encapsulation currently emits the all-zero header: no nonce, no instance ID and no
/// locator status bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LispHeader {
    flags: LispFlags,
    nonce: u32,
    iid_lsb: u32,
}

impl Default for LispHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl LispHeader {
    /// The length of a [`LispHeader`].
    #[allow(clippy::unwrap_used)] // trivially safe const expression
    pub const LENGTH: NonZero<usize> = NonZero::new(8).unwrap();

    const NONCE_MASK: u32 = 0x00ff_ffff;

    /// The all-zero header.
    #[must_use]
    pub const fn new() -> LispHeader {
        LispHeader {
            flags: LispFlags::empty(),
            nonce: 0,
            iid_lsb: 0,
        }
    }

    /// Flags of the header
    #[must_use]
    pub const fn flags(&self) -> LispFlags {
        self.flags
    }

    /// The 24 bit nonce or map-version field
    #[must_use]
    pub const fn nonce(&self) -> u32 {
        self.nonce
    }

    /// The instance ID, if the I flag is set.
    #[must_use]
    pub fn instance_id(&self) -> Option<u32> {
        self.flags
            .contains(LispFlags::I)
            .then_some(self.iid_lsb >> 8)
    }

    /// The locator status bits, if the L flag is set.
    ///
    /// Only the low 8 bits are available when an instance ID is present.
    #[must_use]
    pub fn locator_status_bits(&self) -> Option<u32> {
        if !self.flags.contains(LispFlags::L) {
            return None;
        }
        if self.flags.contains(LispFlags::I) {
            Some(self.iid_lsb & 0xff)
        } else {
            Some(self.iid_lsb)
        }
    }
}

impl Parse for LispHeader {
    type Error = Infallible;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>> {
        LengthError::check(buf, LispHeader::LENGTH).map_err(ParseError::Length)?;
        // reserved flag bits are ignored on receipt
        let flags = LispFlags::from_bits_truncate(buf[0]);
        let nonce = u32::from_be_bytes([0, buf[1], buf[2], buf[3]]);
        let iid_lsb = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok((
            LispHeader {
                flags,
                nonce,
                iid_lsb,
            },
            LispHeader::LENGTH,
        ))
    }
}

impl DeParse for LispHeader {
    type Error = ();

    fn size(&self) -> NonZero<usize> {
        LispHeader::LENGTH
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>> {
        LengthError::check(buf, LispHeader::LENGTH).map_err(DeParseError::Length)?;
        let nonce = (self.nonce & Self::NONCE_MASK).to_be_bytes();
        buf[0] = self.flags.bits();
        buf[1..4].copy_from_slice(&nonce[1..]);
        buf[4..8].copy_from_slice(&self.iid_lsb.to_be_bytes());
        Ok(LispHeader::LENGTH)
    }
}

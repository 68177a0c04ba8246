// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Map-Request message
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Type=1 |A|M|P|S|p|s|R|R|  Rsvd   |   IRC   | Record Count  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Nonce . . .                           |
//! |                         . . . Nonce                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Source-EID-AFI        |   Source EID Address  ...     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         ITR-RLOC-AFI 1        |    ITR-RLOC Address 1  ...    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              ...                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Reserved    | EID mask-len  |        EID-Prefix-AFI         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       EID-Prefix  ...                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! IRC is the number of ITR-RLOCs minus one. A trailing Map-Reply record (M bit) is not parsed.

use crate::lisp::control::{
    ControlBuildError, ControlParseError, ControlType, LispAddr, count_u8,
};
use crate::parse::{DeParse, DeParseError, Parse, ParseError, Reader, Writer};
use arrayvec::ArrayVec;
use bitflags::bitflags;
use core::num::NonZero;

/// Maximum number of ITR-RLOCs a Map-Request can carry
pub const MAX_ITR_RLOCS: usize = 32;

bitflags! {
    /// Flags of a [`MapRequest`], as the first two bytes of the message without the type.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MapRequestFlags: u16 {
        /// Authoritative
        const AUTHORITATIVE = 0x0800;
        /// A Map-Reply record is included
        const MAP_DATA_PRESENT = 0x0400;
        /// RLOC probe
        const PROBE = 0x0200;
        /// Solicit Map-Request
        const SMR = 0x0100;
        /// Sent by a proxy ITR
        const PITR = 0x0080;
        /// Sent in response to an SMR
        const SMR_INVOKED = 0x0040;
    }
}

/// One EID prefix being requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EidRecord {
    /// Prefix length
    pub mask_len: u8,
    /// Prefix address
    pub eid: LispAddr,
}

/// A Map-Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    /// Header flags
    pub flags: MapRequestFlags,
    /// Nonce to be echoed in replies
    pub nonce: u64,
    /// EID of the requester
    pub source_eid: LispAddr,
    /// Addresses the requester can be answered at, in order of preference
    pub itr_rlocs: ArrayVec<LispAddr, MAX_ITR_RLOCS>,
    /// Requested prefixes
    pub records: Vec<EidRecord>,
}

impl MapRequest {
    const FIXED_LEN: usize = 12;

    /// True if the RLOC-probe bit is set
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.flags.contains(MapRequestFlags::PROBE)
    }

    /// True if the solicit-map-request bit is set
    #[must_use]
    pub fn is_smr(&self) -> bool {
        self.flags.contains(MapRequestFlags::SMR)
    }
}

impl Parse for MapRequest {
    type Error = ControlParseError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>> {
        let mut r = Reader::new(buf);
        let [b0, b1, b2, record_count] = r.array::<4>()?;
        if b0 >> 4 != ControlType::MapRequest as u8 {
            return Err(ParseError::Invalid(ControlParseError::UnexpectedType {
                expected: ControlType::MapRequest,
                found: b0 >> 4,
            }));
        }
        let flags = MapRequestFlags::from_bits_truncate(
            (u16::from(b0 & 0x0f) << 8) | u16::from(b1),
        );
        let itr_count = usize::from(b2 & 0x1f) + 1;
        let nonce = r.u64()?;
        let source_eid = LispAddr::read(&mut r)?;
        let mut itr_rlocs = ArrayVec::new();
        for _ in 0..itr_count {
            // at most 32 by construction of the count
            itr_rlocs.push(LispAddr::read(&mut r)?);
        }
        let mut records = Vec::with_capacity(usize::from(record_count));
        for _ in 0..record_count {
            r.skip(1)?;
            let mask_len = r.u8()?;
            let eid = LispAddr::read(&mut r)?;
            eid.check_mask_len(mask_len).map_err(ParseError::Invalid)?;
            records.push(EidRecord { mask_len, eid });
        }
        let consumed = NonZero::new(r.consumed()).unwrap_or(NonZero::<usize>::MIN);
        Ok((
            MapRequest {
                flags,
                nonce,
                source_eid,
                itr_rlocs,
                records,
            },
            consumed,
        ))
    }
}

impl DeParse for MapRequest {
    type Error = ControlBuildError;

    fn size(&self) -> NonZero<usize> {
        let len = Self::FIXED_LEN
            + self.source_eid.wire_len()
            + self.itr_rlocs.iter().map(LispAddr::wire_len).sum::<usize>()
            + self
                .records
                .iter()
                .map(|rec| 2 + rec.eid.wire_len())
                .sum::<usize>();
        NonZero::new(len).unwrap_or(NonZero::<usize>::MIN)
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>> {
        let irc = self
            .itr_rlocs
            .len()
            .checked_sub(1)
            .ok_or(DeParseError::Invalid(ControlBuildError::NoItrRloc))?;
        let record_count =
            count_u8("records", self.records.len()).map_err(DeParseError::Invalid)?;
        let [hi, lo] = self.flags.bits().to_be_bytes();
        let mut w = Writer::new(buf);
        w.u8(ControlType::MapRequest.header_byte() | (hi & 0x0f))?;
        w.u8(lo)?;
        // irc < 32 since the list holds at most 32 entries
        w.u8(count_u8("itr-rlocs", irc).map_err(DeParseError::Invalid)? & 0x1f)?;
        w.u8(record_count)?;
        w.u64(self.nonce)?;
        self.source_eid.write(&mut w)?;
        for rloc in &self.itr_rlocs {
            rloc.write(&mut w)?;
        }
        for record in &self.records {
            w.u8(0)?;
            w.u8(record.mask_len)?;
            record.eid.write(&mut w)?;
        }
        Ok(NonZero::new(w.written()).unwrap_or(NonZero::<usize>::MIN))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::lisp::control::{
        ControlBuildError, ControlParseError, EidRecord, LispAddr, MapRequest, MapRequestFlags,
        to_vec,
    };
    use crate::parse::{DeParseError, Parse, ParseError};
    use arrayvec::ArrayVec;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn ip(a: u8, b: u8, c: u8, d: u8) -> LispAddr {
        LispAddr::Ip(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    fn request() -> MapRequest {
        let mut itr_rlocs = ArrayVec::new();
        itr_rlocs.push(LispAddr::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        itr_rlocs.push(ip(192, 0, 2, 9));
        MapRequest {
            flags: MapRequestFlags::SMR_INVOKED,
            nonce: 0x0102_0304_0506_0708,
            source_eid: ip(10, 1, 0, 1),
            itr_rlocs,
            records: vec![
                EidRecord {
                    mask_len: 32,
                    eid: ip(10, 0, 0, 5),
                },
                EidRecord {
                    mask_len: 64,
                    eid: LispAddr::Ip(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0))),
                },
            ],
        }
    }

    #[test]
    fn wire_layout() {
        let bytes = to_vec(&request()).unwrap();
        assert_eq!(bytes[0], 0x10);
        assert_eq!(bytes[1], 0x40);
        assert_eq!(bytes[2], 1); // two ITR-RLOCs
        assert_eq!(bytes[3], 2);
        assert_eq!(bytes[4..12], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bytes[12..18], [0, 1, 10, 1, 0, 1]);
        let (parsed, consumed) = MapRequest::parse(&bytes).unwrap();
        assert_eq!(consumed.get(), bytes.len());
        assert_eq!(parsed, request());
    }

    #[test]
    fn probe_and_smr_bits() {
        let mut req = request();
        req.flags = MapRequestFlags::PROBE | MapRequestFlags::SMR;
        let bytes = to_vec(&req).unwrap();
        assert_eq!(bytes[0], 0x13);
        let (parsed, _) = MapRequest::parse(&bytes).unwrap();
        assert!(parsed.is_probe());
        assert!(parsed.is_smr());
        assert!(!request().is_probe());
    }

    #[test]
    fn parse_noise() {
        bolero::check!().for_each(|bytes: &[u8]| {
            // must never panic, whatever the input
            if let Ok((req, consumed)) = MapRequest::parse(bytes) {
                assert!(consumed.get() <= bytes.len());
                assert!(!req.itr_rlocs.is_empty());
            }
        });
    }

    #[test]
    fn bad_messages_are_refused() {
        let mut bytes = to_vec(&request()).unwrap();
        let full = bytes.clone();
        bytes[0] = 0x20;
        assert!(matches!(
            MapRequest::parse(&bytes),
            Err(ParseError::Invalid(ControlParseError::UnexpectedType { found: 2, .. }))
        ));
        bytes = full.clone();
        // mask length of the first (IPv4) record, followed by the 20 byte IPv6 record
        let v4_mask_len = full.len() - 20 - 8 + 1;
        bytes[v4_mask_len] = 33;
        assert_eq!(
            MapRequest::parse(&bytes).unwrap_err(),
            ParseError::Invalid(ControlParseError::BadMaskLength {
                afi: crate::ip::Afi::Ipv4,
                mask_len: 33
            })
        );
        assert!(matches!(
            MapRequest::parse(&full[..full.len() - 1]),
            Err(ParseError::Length(_))
        ));
    }

    #[test]
    fn named_itr_rlocs_are_kept() {
        let mut req = request();
        req.itr_rlocs.insert(0, LispAddr::Name(b"xtr-1".to_vec()));
        let bytes = to_vec(&req).unwrap();
        assert_eq!(bytes[2], 2);
        assert_eq!(bytes[18..26], [0, 17, b'x', b't', b'r', b'-', b'1', 0]);
        let (parsed, consumed) = MapRequest::parse(&bytes).unwrap();
        assert_eq!(consumed.get(), bytes.len());
        assert_eq!(parsed, req);
    }

    #[test]
    fn needs_an_itr_rloc() {
        let mut req = request();
        req.itr_rlocs.clear();
        assert_eq!(
            to_vec(&req).unwrap_err(),
            DeParseError::Invalid(ControlBuildError::NoItrRloc)
        );
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Map-Reply message
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Type=2 |P|E|S|          Reserved               | Record Count  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Nonce . . .                           |
//! |                         . . . Nonce                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Record TTL                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Locator Count | EID mask-len  | ACT |A|      Reserved         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Rsvd  |  Map-Version Number   |       EID-Prefix-AFI          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          EID-Prefix                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Priority    |    Weight     |  M Priority   |   M Weight    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Unused Flags     |L|p|R|           Loc-AFI             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             Locator                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The record TTL is expressed in minutes.

use crate::lisp::control::{
    ControlBuildError, ControlParseError, ControlType, LispAddr, count_u8,
};
use crate::parse::{DeParse, DeParseError, Parse, ParseError, Reader, Writer};
use bitflags::bitflags;
use core::num::NonZero;

bitflags! {
    /// Flags of a [`MapReply`]
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MapReplyFlags: u8 {
        /// Reply to an RLOC probe
        const PROBE = 0x08;
        /// Echo nonce capable
        const ECHO_NONCE = 0x04;
        /// Security data follows
        const SECURITY = 0x02;
    }
}

bitflags! {
    /// Flags of a [`LocatorRecord`]
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct LocatorFlags: u16 {
        /// Locator is local to the sender
        const LOCAL = 0x0004;
        /// Locator was probed
        const PROBED = 0x0002;
        /// Locator is reachable
        const REACHABLE = 0x0001;
    }
}

/// Action attached to a mapping record, relevant for records without locators
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum MapReplyAction {
    /// Use the locators
    #[default]
    NoAction = 0,
    /// Forward natively
    NativelyForward = 1,
    /// Send a Map-Request
    SendMapRequest = 2,
    /// Drop, no reason given
    Drop = 3,
    /// Drop, policy denied
    DropPolicyDenied = 4,
    /// Drop, authentication failure
    DropAuthFailure = 5,
}

impl TryFrom<u8> for MapReplyAction {
    type Error = ControlParseError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => MapReplyAction::NoAction,
            1 => MapReplyAction::NativelyForward,
            2 => MapReplyAction::SendMapRequest,
            3 => MapReplyAction::Drop,
            4 => MapReplyAction::DropPolicyDenied,
            5 => MapReplyAction::DropAuthFailure,
            other => return Err(ControlParseError::UnknownAction(other)),
        })
    }
}

/// A locator of a [`MappingRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRecord {
    /// Unicast priority, lower is preferred, 255 means unusable
    pub priority: u8,
    /// Unicast weight within the priority
    pub weight: u8,
    /// Multicast priority
    pub mpriority: u8,
    /// Multicast weight
    pub mweight: u8,
    /// Status flags
    pub flags: LocatorFlags,
    /// Locator address
    pub rloc: LispAddr,
}

impl LocatorRecord {
    fn wire_len(&self) -> usize {
        6 + self.rloc.wire_len()
    }
}

/// One EID prefix to locators mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    /// Validity in minutes
    pub ttl: u32,
    /// Prefix length
    pub mask_len: u8,
    /// Action for packets matching a record without locators
    pub action: MapReplyAction,
    /// Sent by an authoritative source
    pub authoritative: bool,
    /// Map-version (12 bits)
    pub map_version: u16,
    /// Prefix address
    pub eid: LispAddr,
    /// Locators
    pub locators: Vec<LocatorRecord>,
}

impl MappingRecord {
    fn wire_len(&self) -> usize {
        10 + self.eid.wire_len()
            + self
                .locators
                .iter()
                .map(LocatorRecord::wire_len)
                .sum::<usize>()
    }

    fn read(r: &mut Reader) -> Result<MappingRecord, ParseError<ControlParseError>> {
        let ttl = r.u32()?;
        let locator_count = r.u8()?;
        let mask_len = r.u8()?;
        let act_a = r.u8()?;
        r.skip(1)?;
        let map_version = r.u16()? & 0x0fff;
        let eid = LispAddr::read(r)?;
        eid.check_mask_len(mask_len).map_err(ParseError::Invalid)?;
        let action = MapReplyAction::try_from(act_a >> 5).map_err(ParseError::Invalid)?;
        let mut locators = Vec::with_capacity(usize::from(locator_count));
        for _ in 0..locator_count {
            let [priority, weight, mpriority, mweight] = r.array::<4>()?;
            let flags = LocatorFlags::from_bits_truncate(r.u16()?);
            let rloc = LispAddr::read(r)?;
            locators.push(LocatorRecord {
                priority,
                weight,
                mpriority,
                mweight,
                flags,
                rloc,
            });
        }
        Ok(MappingRecord {
            ttl,
            mask_len,
            action,
            authoritative: act_a & 0x10 != 0,
            map_version,
            eid,
            locators,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<(), DeParseError<ControlBuildError>> {
        let locator_count =
            count_u8("locators", self.locators.len()).map_err(DeParseError::Invalid)?;
        w.u32(self.ttl)?;
        w.u8(locator_count)?;
        w.u8(self.mask_len)?;
        w.u8(((self.action as u8) << 5) | if self.authoritative { 0x10 } else { 0 })?;
        w.u8(0)?;
        w.u16(self.map_version & 0x0fff)?;
        self.eid.write(w)?;
        for loc in &self.locators {
            w.put(&[loc.priority, loc.weight, loc.mpriority, loc.mweight])?;
            w.u16(loc.flags.bits())?;
            loc.rloc.write(w)?;
        }
        Ok(())
    }
}

/// A Map-Reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReply {
    /// Header flags
    pub flags: MapReplyFlags,
    /// Nonce of the Map-Request being answered
    pub nonce: u64,
    /// Mapping records
    pub records: Vec<MappingRecord>,
}

impl MapReply {
    const FIXED_LEN: usize = 12;
}

impl Parse for MapReply {
    type Error = ControlParseError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>> {
        let mut r = Reader::new(buf);
        let [b0, _, _, record_count] = r.array::<4>()?;
        if b0 >> 4 != ControlType::MapReply as u8 {
            return Err(ParseError::Invalid(ControlParseError::UnexpectedType {
                expected: ControlType::MapReply,
                found: b0 >> 4,
            }));
        }
        let flags = MapReplyFlags::from_bits_truncate(b0 & 0x0f);
        let nonce = r.u64()?;
        let mut records = Vec::with_capacity(usize::from(record_count));
        for _ in 0..record_count {
            records.push(MappingRecord::read(&mut r)?);
        }
        let consumed = NonZero::new(r.consumed()).unwrap_or(NonZero::<usize>::MIN);
        Ok((
            MapReply {
                flags,
                nonce,
                records,
            },
            consumed,
        ))
    }
}

impl DeParse for MapReply {
    type Error = ControlBuildError;

    fn size(&self) -> NonZero<usize> {
        let len = Self::FIXED_LEN
            + self
                .records
                .iter()
                .map(MappingRecord::wire_len)
                .sum::<usize>();
        NonZero::new(len).unwrap_or(NonZero::<usize>::MIN)
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>> {
        let record_count =
            count_u8("records", self.records.len()).map_err(DeParseError::Invalid)?;
        let mut w = Writer::new(buf);
        w.u8(ControlType::MapReply.header_byte() | self.flags.bits())?;
        w.put(&[0, 0])?;
        w.u8(record_count)?;
        w.u64(self.nonce)?;
        for record in &self.records {
            record.write(&mut w)?;
        }
        Ok(NonZero::new(w.written()).unwrap_or(NonZero::<usize>::MIN))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::lisp::control::{
        ControlParseError, LispAddr, LocatorFlags, LocatorRecord, MapReply, MapReplyAction,
        MapReplyFlags, MappingRecord, to_vec,
    };
    use crate::parse::{Parse, ParseError};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn reply() -> MapReply {
        MapReply {
            flags: MapReplyFlags::empty(),
            nonce: 0xdead_beef_0000_0001,
            records: vec![MappingRecord {
                ttl: 1440,
                mask_len: 24,
                action: MapReplyAction::NoAction,
                authoritative: true,
                map_version: 0,
                eid: LispAddr::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0))),
                locators: vec![
                    LocatorRecord {
                        priority: 1,
                        weight: 100,
                        mpriority: 255,
                        mweight: 0,
                        flags: LocatorFlags::REACHABLE | LocatorFlags::LOCAL,
                        rloc: LispAddr::Ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
                    },
                    LocatorRecord {
                        priority: 2,
                        weight: 50,
                        mpriority: 255,
                        mweight: 0,
                        flags: LocatorFlags::REACHABLE,
                        rloc: LispAddr::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
                    },
                ],
            }],
        }
    }

    #[test]
    fn wire_layout() {
        let bytes = to_vec(&reply()).unwrap();
        assert_eq!(bytes[0], 0x20);
        assert_eq!(bytes[3], 1);
        assert_eq!(bytes[4..12], 0xdead_beef_0000_0001u64.to_be_bytes());
        // ttl, locator count, mask length, action and A bit
        assert_eq!(bytes[12..16], 1440u32.to_be_bytes());
        assert_eq!(bytes[16..19], [2, 24, 0x10]);
        // eid
        assert_eq!(bytes[21..28], [0, 0, 1, 10, 0, 0, 0]);
        // first locator
        assert_eq!(bytes[28..34], [1, 100, 255, 0, 0, 5]);
        assert_eq!(bytes[34..40], [0, 1, 192, 0, 2, 1]);
        let (parsed, consumed) = MapReply::parse(&bytes).unwrap();
        assert_eq!(consumed.get(), bytes.len());
        assert_eq!(parsed, reply());
    }

    #[test]
    fn negative_reply() {
        let mut negative = reply();
        negative.records[0].locators.clear();
        negative.records[0].action = MapReplyAction::NativelyForward;
        negative.flags = MapReplyFlags::PROBE;
        let bytes = to_vec(&negative).unwrap();
        assert_eq!(bytes[0], 0x28);
        assert_eq!(bytes[18], 0x30);
        assert_eq!(MapReply::parse(&bytes).unwrap().0, negative);
    }

    #[test]
    fn unknown_action_is_refused() {
        let mut bytes = to_vec(&reply()).unwrap();
        bytes[18] = 0xe0;
        assert_eq!(
            MapReply::parse(&bytes).unwrap_err(),
            ParseError::Invalid(ControlParseError::UnknownAction(7))
        );
    }

    #[test]
    fn parse_noise() {
        bolero::check!().for_each(|bytes: &[u8]| {
            if let Ok((reply, consumed)) = MapReply::parse(bytes) {
                assert!(consumed.get() <= bytes.len());
                assert!(reply.records.len() <= 255);
            }
        });
    }
}

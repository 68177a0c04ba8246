// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! LISP control messages.
//!
//! Only the messages a Map-Server and an xTR exchange with each other are modelled in full:
//! [`MapRequest`] and [`MapReply`]. Other types are recognized so that they can be dispatched
//! (and discarded) by the receiver.

mod addr;
mod map_reply;
mod map_request;

pub use addr::{Lcaf, LispAddr};
pub use map_reply::{
    LocatorFlags, LocatorRecord, MapReply, MapReplyAction, MapReplyFlags, MappingRecord,
};
pub use map_request::{EidRecord, MAX_ITR_RLOCS, MapRequest, MapRequestFlags};

use crate::ip::Afi;
use crate::parse::{DeParse, DeParseError, LengthError, ParseError};
use core::num::NonZero;
use std::fmt::{Display, Formatter};

/// Type of a LISP control message, carried in the high nibble of its first byte.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControlType {
    /// Map-Request
    MapRequest = 1,
    /// Map-Reply
    MapReply = 2,
    /// Map-Register
    MapRegister = 3,
    /// Map-Notify
    MapNotify = 4,
    /// Info-Request and Info-Reply (NAT traversal)
    InfoNat = 7,
    /// Encapsulated Control Message
    EncapsulatedControl = 8,
}

impl ControlType {
    /// Read the type of the message in `msg`.
    ///
    /// # Errors
    ///
    /// Fails on an empty buffer or an unknown type.
    pub fn of(msg: &[u8]) -> Result<ControlType, ParseError<ControlParseError>> {
        LengthError::check(msg, NonZero::<usize>::MIN)?;
        ControlType::try_from(msg[0] >> 4).map_err(ParseError::Invalid)
    }

    pub(crate) const fn header_byte(self) -> u8 {
        (self as u8) << 4
    }
}

impl TryFrom<u8> for ControlType {
    type Error = ControlParseError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            1 => ControlType::MapRequest,
            2 => ControlType::MapReply,
            3 => ControlType::MapRegister,
            4 => ControlType::MapNotify,
            7 => ControlType::InfoNat,
            8 => ControlType::EncapsulatedControl,
            other => return Err(ControlParseError::UnknownType(other)),
        })
    }
}

impl Display for ControlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlType::MapRequest => "Map-Request",
            ControlType::MapReply => "Map-Reply",
            ControlType::MapRegister => "Map-Register",
            ControlType::MapNotify => "Map-Notify",
            ControlType::InfoNat => "Info-NAT",
            ControlType::EncapsulatedControl => "ECM",
        };
        write!(f, "{name}")
    }
}

/// Errors which may occur while parsing a control message.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlParseError {
    /// The type nibble is not a known control message type.
    #[error("unknown control message type {0}")]
    UnknownType(u8),
    /// The message is of another type than the one being parsed.
    #[error("expected {expected}, found type {found}")]
    UnexpectedType {
        /// Type being parsed
        expected: ControlType,
        /// Type found in the message
        found: u8,
    },
    /// An address is of an unsupported family.
    #[error("unsupported address family {0}")]
    UnsupportedAfi(u16),
    /// A prefix length exceeds the address length.
    #[error("prefix length {mask_len} is too long for {afi}")]
    BadMaskLength {
        /// Family of the prefix
        afi: Afi,
        /// Prefix length found in the message
        mask_len: u8,
    },
    /// A Map-Reply action code is not defined.
    #[error("unknown map-reply action {0}")]
    UnknownAction(u8),
}

/// Errors which may occur while building a control message.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlBuildError {
    /// A Map-Request needs between one and 32 ITR-RLOCs.
    #[error("a map-request needs at least one ITR-RLOC")]
    NoItrRloc,
    /// A count field would overflow.
    #[error("too many {what}: {count}")]
    TooMany {
        /// Kind of element
        what: &'static str,
        /// Number of elements
        count: usize,
    },
    /// A message of this size cannot be represented.
    #[error("message is too large")]
    TooLarge,
}

pub(crate) fn count_u8(what: &'static str, count: usize) -> Result<u8, ControlBuildError> {
    u8::try_from(count).map_err(|_| ControlBuildError::TooMany { what, count })
}

/// Serialize a control message into a new buffer.
///
/// # Errors
///
/// Returns the serialization error of the message.
pub fn to_vec<T: DeParse<Error = ControlBuildError>>(
    msg: &T,
) -> Result<Vec<u8>, DeParseError<ControlBuildError>> {
    let mut out = vec![0u8; msg.size().get()];
    msg.deparse(&mut out)?;
    Ok(out)
}

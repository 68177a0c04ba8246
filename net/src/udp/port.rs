// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP port type

use std::fmt::{Display, Formatter};
use std::num::NonZero;

/// Transparent wrapper type for udp ports.
///
/// Zero is reserved to mean "any port" and is never valid on the wire.
#[repr(transparent)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[derive(
    Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct UdpPort(NonZero<u16>);

/// Errors which may occur in the creation of a [`UdpPort`].
#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum UdpPortError {
    /// Port zero is not a valid port.
    #[error("port must be non-zero")]
    Zero,
}

impl UdpPort {
    /// Create a [`UdpPort`].
    #[must_use]
    pub const fn new(port: NonZero<u16>) -> UdpPort {
        UdpPort(port)
    }

    /// Create a [`UdpPort`].
    ///
    /// # Errors
    ///
    /// Will return an error if the submitted raw port number is zero.
    pub const fn new_checked(port: u16) -> Result<UdpPort, UdpPortError> {
        match NonZero::new(port) {
            None => Err(UdpPortError::Zero),
            Some(port) => Ok(UdpPort(port)),
        }
    }

    /// Get the value of a [`UdpPort`] as a u16
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0.get()
    }
}

impl From<UdpPort> for u16 {
    fn from(port: UdpPort) -> Self {
        port.as_u16()
    }
}

impl TryFrom<u16> for UdpPort {
    type Error = UdpPortError;

    fn try_from(port: u16) -> Result<Self, Self::Error> {
        UdpPort::new_checked(port)
    }
}

impl Display for UdpPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing locators

use crate::errors::MappingError;
use net::ip::Afi;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// Priority marking a locator as not to be used for unicast traffic
pub const UNUSABLE_PRIORITY: u8 = 255;
/// Largest locator weight
pub const MAX_WEIGHT: u8 = 100;

/// Identifies an output socket: the interface a local locator lives on and its family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketKey {
    pub interface: String,
    pub afi: Afi,
}

impl SocketKey {
    #[must_use]
    pub fn new(interface: impl Into<String>, afi: Afi) -> Self {
        Self {
            interface: interface.into(),
            afi,
        }
    }
}

impl Display for SocketKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.interface, self.afi)
    }
}

/// A locator of a mapping.
///
/// Local locators know the socket to send from and, when behind a NAT, the RTRs their
/// traffic has to go through. Remote locators have neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    addr: IpAddr,
    priority: u8,
    weight: u8,
    rtrs: Vec<IpAddr>,
    socket: Option<SocketKey>,
}

impl Locator {
    /// Build a locator.
    ///
    /// # Errors
    ///
    /// Fails if the weight is above [`MAX_WEIGHT`].
    pub fn new(addr: IpAddr, priority: u8, weight: u8) -> Result<Locator, MappingError> {
        if weight > MAX_WEIGHT {
            return Err(MappingError::Weight(weight));
        }
        Ok(Self {
            addr,
            priority,
            weight,
            rtrs: Vec::new(),
            socket: None,
        })
    }

    /// Make this a local locator sending through `socket`.
    #[must_use]
    pub fn with_socket(mut self, socket: SocketKey) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Set the RTRs this locator is reachable through.
    #[must_use]
    pub fn with_rtrs(mut self, rtrs: Vec<IpAddr>) -> Self {
        self.rtrs = rtrs;
        self
    }

    pub fn set_rtrs(&mut self, rtrs: Vec<IpAddr>) {
        self.rtrs = rtrs;
    }

    #[must_use]
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn afi(&self) -> Afi {
        Afi::of(&self.addr)
    }

    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[must_use]
    pub fn weight(&self) -> u8 {
        self.weight
    }

    /// RTRs to send through instead of the peer, first one preferred.
    #[must_use]
    pub fn rtrs(&self) -> &[IpAddr] {
        &self.rtrs
    }

    #[must_use]
    pub fn socket(&self) -> Option<&SocketKey> {
        self.socket.as_ref()
    }

    /// False if the priority forbids using the locator
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.priority != UNUSABLE_PRIORITY
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} p{} w{}", self.addr, self.priority, self.weight)?;
        if let Some(socket) = &self.socket {
            write!(f, " via {socket}")?;
        }
        if let Some(rtr) = self.rtrs.first() {
            write!(f, " rtr {rtr}")?;
        }
        Ok(())
    }
}

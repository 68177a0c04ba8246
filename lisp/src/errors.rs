// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error types of the LISP node

use crate::locator::SocketKey;
use crate::mapping::EidKey;
use net::ip::Afi;
use net::lisp::control::{ControlBuildError, ControlParseError, ControlType};
use net::lisp::encap::EncapError;
use net::parse::{DeParseError, ParseError};
use net::tuple::ClassifyError;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NonceError {
    #[error("retry budget exhausted after {0} requests")]
    RetryBudgetExhausted(usize),
    #[error("failed to read the monotonic clock: {0}")]
    Clock(nix::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("weight {0} exceeds 100")]
    Weight(u8),
    #[error("unsupported EID {0}")]
    UnsupportedEid(String),
    #[error("bad EID prefix length {0}")]
    PrefixLength(u8),
    #[error("multicast key needs source and group of the same family: {0}, {1}")]
    MixedSg(IpAddr, IpAddr),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    #[error("no usable locator")]
    NoLocator,
    #[error("no address family shared by source and destination locators")]
    NoCompatibleAfi,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapCacheError {
    #[error("no map-cache entry for {0}")]
    UnknownEntry(EidKey),
    #[error("map-cache entry {0} is static")]
    StaticEntry(EidKey),
    #[error("gave up resolving {0}: retry budget exhausted")]
    RetryBudgetExhausted(EidKey),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("dropping malformed packet: {0}")]
    Parse(#[from] ClassifyError),
    #[error("no address family shared by source and destination locators")]
    NoCompatibleAfi,
    #[error(transparent)]
    Encap(#[from] EncapError),
    #[error("no output socket for locator {0}")]
    NoSocket(IpAddr),
    #[error("failed to send on {socket}: {err}")]
    Transmit {
        socket: SocketKey,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to forward natively over {afi}: {err}")]
    Native {
        afi: Afi,
        #[source]
        err: std::io::Error,
    },
    #[error("no replication targets for group {0}")]
    NoReplicationTargets(IpAddr),
    #[error("failed to read from the tunnel device: {0}")]
    Read(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("malformed control message: {0}")]
    Parse(#[from] ParseError<ControlParseError>),
    #[error("{0} messages are not supported")]
    Unsupported(ControlType),
    #[error("map-request has the RLOC-probe bit set")]
    ProbeBitSet,
    #[error("map-request has the SMR bit set")]
    SmrBitSet,
    #[error("no {0} ITR-RLOC in map-request")]
    NoItrRloc(Afi),
    #[error("control role {0} is not supported")]
    UnsupportedRole(&'static str),
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("cannot encode EID {0} in a map-reply")]
    UnsupportedEid(EidKey),
    #[error("failed to build map-reply: {0}")]
    Build(#[from] DeParseError<ControlBuildError>),
    #[error("failed to send map-reply: {0}")]
    Transmit(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("cannot encode EID {0} in a map-request")]
    UnsupportedEid(EidKey),
    #[error(transparent)]
    MapCache(#[from] MapCacheError),
    #[error(transparent)]
    Nonce(#[from] NonceError),
    #[error("failed to build map-request: {0}")]
    Build(#[from] DeParseError<ControlBuildError>),
}

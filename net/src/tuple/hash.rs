// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow hashing.
//!
//! The tuple is first serialized into a [`FlowKey`]: an explicit, versioned byte layout that
//! does not depend on the host's byte order or on struct padding. The key is then hashed with
//! a fixed-seed hasher so that a flow hashes to the same value for the lifetime of the process.

use crate::tuple::PacketTuple;
use ahash::RandomState;
use arrayvec::ArrayVec;
use std::hash::{BuildHasher, Hasher};
use std::net::IpAddr;

/// Seed of the flow hash
pub const FLOW_HASH_SEED: u64 = 2013;

/// Version of the [`FlowKey`] layout
pub const FLOW_KEY_VERSION: u8 = 1;

const FLOW_KEY_MAX_LEN: usize = 1 + 1 + 16 + 16 + 4 + 1;

/// Serialized tuple fed to the flow hash.
///
/// Layout: version, family tag (4 or 6), source octets, destination octets,
/// `src_port | dst_port << 16` as a big endian u32, protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowKey(ArrayVec<u8, FLOW_KEY_MAX_LEN>);

impl FlowKey {
    /// The serialized bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&PacketTuple> for FlowKey {
    fn from(tuple: &PacketTuple) -> Self {
        let mut key = ArrayVec::new();
        key.push(FLOW_KEY_VERSION);
        // the capacity covers the largest (IPv6) layout
        let mut put = |bytes: &[u8]| {
            for b in bytes {
                key.push(*b);
            }
        };
        match (tuple.src, tuple.dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => {
                put(&[4]);
                put(&src.octets());
                put(&dst.octets());
            }
            (src, dst) => {
                put(&[6]);
                put(&to_v6_octets(src));
                put(&to_v6_octets(dst));
            }
        }
        let ports = u32::from(tuple.src_port) | (u32::from(tuple.dst_port) << 16);
        put(&ports.to_be_bytes());
        put(&[tuple.protocol]);
        FlowKey(key)
    }
}

fn to_v6_octets(addr: IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(a) => a.to_ipv6_mapped().octets(),
        IpAddr::V6(a) => a.octets(),
    }
}

const FLOW_HASHER: RandomState = RandomState::with_seeds(FLOW_HASH_SEED, 0, 0, 0);

impl PacketTuple {
    /// The serialized form of this tuple
    #[must_use]
    pub fn flow_key(&self) -> FlowKey {
        FlowKey::from(self)
    }

    /// 32 bit hash of the flow.
    ///
    /// Equal tuples always hash to the same value.
    #[must_use]
    pub fn flow_hash(&self) -> u32 {
        let mut hasher = FLOW_HASHER.build_hasher();
        hasher.write(self.flow_key().as_bytes());
        #[allow(clippy::cast_possible_truncation)] // truncation intended
        let hash = hasher.finish() as u32;
        hash
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Building and sending Map-Replies

use crate::errors::{MappingError, ReplyError};
use crate::locator::{Locator, UNUSABLE_PRIORITY};
use crate::mapping::{EidKey, Mapping};
use crate::nonce::Nonce;
use lpm::prefix::Prefix;
use net::lisp::control::{
    LispAddr, LocatorFlags, LocatorRecord, MapReply, MapReplyAction, MapReplyFlags,
    MappingRecord, to_vec,
};
use std::net::IpAddr;
use tracing::debug;

/// TTL of the records we send, in minutes
pub const DEFAULT_REPLY_TTL: u32 = 1440;

/// Flags of a Map-Reply to send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapReplyOpts {
    /// Answer to an RLOC probe
    pub rloc_probe: bool,
    /// Advertise echo-nonce support
    pub echo_nonce: bool,
}

/// Sends Map-Replies on behalf of the control handlers
pub trait MapReplySender {
    /// Send a Map-Reply carrying `mapping` to `remote_rloc:port`, from `local_rloc`.
    ///
    /// # Errors
    ///
    /// Fails if the reply cannot be built or sent.
    fn build_and_send_map_reply(
        &mut self,
        mapping: &Mapping,
        local_rloc: IpAddr,
        remote_rloc: IpAddr,
        port: u16,
        nonce: Nonce,
        opts: MapReplyOpts,
    ) -> Result<(), ReplyError>;
}

fn locator_record(locator: &Locator) -> LocatorRecord {
    let mut flags = LocatorFlags::REACHABLE;
    if locator.socket().is_some() {
        flags |= LocatorFlags::LOCAL;
    }
    LocatorRecord {
        priority: locator.priority(),
        weight: locator.weight(),
        mpriority: UNUSABLE_PRIORITY,
        mweight: 0,
        flags,
        rloc: LispAddr::Ip(locator.addr()),
    }
}

/// Encode a Map-Reply with a single record for `mapping`.
///
/// # Errors
///
/// Fails for multicast mappings, which need an LCAF EID, and if the message cannot be
/// encoded.
pub fn build_map_reply(
    mapping: &Mapping,
    nonce: Nonce,
    opts: MapReplyOpts,
    ttl_minutes: u32,
) -> Result<Vec<u8>, ReplyError> {
    let EidKey::Ip(prefix) = mapping.eid() else {
        return Err(ReplyError::UnsupportedEid(*mapping.eid()));
    };
    let mut flags = MapReplyFlags::empty();
    if opts.rloc_probe {
        flags |= MapReplyFlags::PROBE;
    }
    if opts.echo_nonce {
        flags |= MapReplyFlags::ECHO_NONCE;
    }
    let action = if mapping.is_negative() {
        MapReplyAction::NativelyForward
    } else {
        MapReplyAction::NoAction
    };
    let record = MappingRecord {
        ttl: ttl_minutes,
        mask_len: prefix.length(),
        action,
        authoritative: true,
        map_version: 0,
        eid: LispAddr::Ip(prefix.as_address()),
        locators: mapping.iter_locators().map(locator_record).collect(),
    };
    let reply = MapReply {
        flags,
        nonce: nonce.as_u64(),
        records: vec![record],
    };
    Ok(to_vec(&reply)?)
}

/// Turn a received mapping record into a [`Mapping`].
///
/// Locators which are not IP addresses are skipped.
///
/// # Errors
///
/// Fails if the EID is not an IP prefix.
pub fn mapping_from_record(record: &MappingRecord) -> Result<Mapping, MappingError> {
    let addr = record
        .eid
        .ip()
        .ok_or_else(|| MappingError::UnsupportedEid(record.eid.to_string()))?;
    let prefix = Prefix::new(addr, record.mask_len)
        .map_err(|_| MappingError::PrefixLength(record.mask_len))?;
    let mut mapping = Mapping::new(prefix);
    for loc in &record.locators {
        let Some(rloc) = loc.rloc.ip() else {
            debug!("Skipping locator {} of {prefix}", loc.rloc);
            continue;
        };
        match Locator::new(rloc, loc.priority, loc.weight) {
            Ok(locator) => {
                mapping.add_locator(locator);
            }
            Err(e) => debug!("Skipping locator {rloc} of {prefix}: {e}"),
        }
    }
    Ok(mapping)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use crate::control::reply::{
        DEFAULT_REPLY_TTL, MapReplyOpts, build_map_reply, mapping_from_record,
    };
    use crate::errors::ReplyError;
    use crate::locator::{Locator, SocketKey};
    use crate::mapping::{EidKey, Mapping};
    use crate::nonce::Nonce;
    use lpm::prefix::Prefix;
    use net::ip::Afi;
    use net::lisp::control::{LispAddr, LocatorFlags, MapReply, MapReplyAction, MapReplyFlags};
    use net::parse::Parse;
    use std::net::IpAddr;
    use std::str::FromStr;

    #[test]
    fn reply_carries_the_mapping() {
        let mapping = Mapping::new(Prefix::from_str("10.0.0.5/32").unwrap())
            .with_locator(
                Locator::new(IpAddr::from([192, 0, 2, 1]), 1, 100)
                    .unwrap()
                    .with_socket(SocketKey::new("eth0", Afi::Ipv4)),
            )
            .with_locator(Locator::new(IpAddr::from_str("2001:db8::1").unwrap(), 2, 50).unwrap());
        let opts = MapReplyOpts {
            echo_nonce: true,
            ..Default::default()
        };
        let bytes = build_map_reply(&mapping, Nonce::from(0xabcd), opts, DEFAULT_REPLY_TTL).unwrap();
        let (reply, consumed) = MapReply::parse(&bytes).unwrap();
        assert_eq!(consumed.get(), bytes.len());
        assert_eq!(reply.nonce, 0xabcd);
        assert_eq!(reply.flags, MapReplyFlags::ECHO_NONCE);
        let record = &reply.records[0];
        assert_eq!(record.mask_len, 32);
        assert_eq!(record.ttl, DEFAULT_REPLY_TTL);
        assert_eq!(record.action, MapReplyAction::NoAction);
        assert!(record.authoritative);
        assert_eq!(record.eid, LispAddr::Ip(IpAddr::from([10, 0, 0, 5])));
        assert_eq!(record.locators.len(), 2);
        assert!(record.locators[0].flags.contains(LocatorFlags::LOCAL));
        assert!(!record.locators[1].flags.contains(LocatorFlags::LOCAL));

        let back = mapping_from_record(record).unwrap();
        assert_eq!(back.eid(), mapping.eid());
        assert_eq!(back.locator_count(), 2);
    }

    #[test]
    fn multicast_mappings_are_refused() {
        let eid = EidKey::sg(
            Prefix::from_str("10.0.0.1").unwrap(),
            Prefix::from_str("239.1.1.1").unwrap(),
        )
        .unwrap();
        let err = build_map_reply(&Mapping::new(eid), Nonce::from(1), MapReplyOpts::default(), 1)
            .unwrap_err();
        assert!(matches!(err, ReplyError::UnsupportedEid(_)));
    }
}

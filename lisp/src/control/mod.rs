// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control message handling.
//!
//! A node plays one control role. A Map-Server answers Map-Requests from its local
//! database. A mobile node (an xTR) learns mappings from the Map-Replies to its own
//! requests. Messages a role has no use for are logged and discarded.

pub mod ms;
pub mod reply;
pub mod xtr;

use crate::errors::ControlError;
use crate::mapcache::MapCache;
use ms::MapServer;
use net::lisp::control::{ControlType, MapReply, MapRequest};
use net::parse::Parse;
use reply::MapReplySender;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, info};
use xtr::MobileNode;

/// Control role of the node
#[derive(Debug)]
pub enum ControlDevice {
    MapServer(MapServer),
    MapResolver,
    Rtr,
    MobileNode(MobileNode),
}

impl Display for ControlDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a control message came from, and what handling it may use
pub struct ControlContext<'a> {
    /// Local address the message was received on
    pub local_rloc: IpAddr,
    /// Source port of the message
    pub remote_port: u16,
    pub now: Instant,
    pub replies: &'a mut dyn MapReplySender,
    pub map_cache: &'a mut MapCache,
}

/// Result of handling a control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Map-Request handled: replies sent, and records without a mapping
    Answered { replies: usize, unknown: usize },
    /// Map-Reply handled: records cached, and records refused
    Cached { accepted: usize, ignored: usize },
    /// Message of no interest to this role
    Discarded(ControlType),
}

impl ControlDevice {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ControlDevice::MapServer(_) => "map-server",
            ControlDevice::MapResolver => "map-resolver",
            ControlDevice::Rtr => "rtr",
            ControlDevice::MobileNode(_) => "mobile-node",
        }
    }

    /// Handle one control message.
    ///
    /// # Errors
    ///
    /// Fails on malformed or unknown messages, on messages the role must reject, and for
    /// roles which do not handle control messages.
    pub fn process_control_message(
        &self,
        msg: &[u8],
        ctx: &mut ControlContext<'_>,
    ) -> Result<ControlOutcome, ControlError> {
        let kind = ControlType::of(msg)?;
        match self {
            ControlDevice::MapServer(ms) => match kind {
                ControlType::MapRequest => {
                    let (request, _) = MapRequest::parse(msg)?;
                    ms.process_map_request(&request, ctx.local_rloc, ctx.remote_port, ctx.replies)
                }
                ControlType::EncapsulatedControl => Err(ControlError::Unsupported(kind)),
                ControlType::MapRegister
                | ControlType::MapReply
                | ControlType::MapNotify
                | ControlType::InfoNat => Ok(discard(kind)),
            },
            ControlDevice::MobileNode(node) => match kind {
                ControlType::MapReply => {
                    let (reply, _) = MapReply::parse(msg)?;
                    Ok(node.process_map_reply(&reply, ctx.map_cache, ctx.now))
                }
                ControlType::EncapsulatedControl => Err(ControlError::Unsupported(kind)),
                ControlType::MapRequest
                | ControlType::MapRegister
                | ControlType::MapNotify
                | ControlType::InfoNat => Ok(discard(kind)),
            },
            ControlDevice::MapResolver | ControlDevice::Rtr => {
                Err(ControlError::UnsupportedRole(self.name()))
            }
        }
    }
}

fn discard(kind: ControlType) -> ControlOutcome {
    if kind == ControlType::MapRegister {
        info!("Map-Register handling is not implemented, discarding");
    } else {
        debug!("Discarding {kind} message");
    }
    ControlOutcome::Discarded(kind)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use crate::control::ms::MapServer;
    use crate::control::reply::{MapReplyOpts, MapReplySender, build_map_reply};
    use crate::control::xtr::MobileNode;
    use crate::control::{ControlContext, ControlDevice, ControlOutcome};
    use crate::database::LocalDb;
    use crate::errors::{ControlError, ReplyError};
    use crate::locator::Locator;
    use crate::mapcache::MapCache;
    use crate::mapping::{EidKey, Mapping};
    use crate::nonce::Nonce;
    use lpm::prefix::Prefix;
    use net::ip::Afi;
    use net::lisp::control::{
        ControlType, EidRecord, LispAddr, MapRequest, MapRequestFlags, to_vec,
    };
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::time::{Duration, Instant};
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        mapping: Mapping,
        local: IpAddr,
        remote: IpAddr,
        port: u16,
        nonce: Nonce,
    }

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Sent>,
        fail: bool,
    }

    impl MapReplySender for Recorder {
        fn build_and_send_map_reply(
            &mut self,
            mapping: &Mapping,
            local_rloc: IpAddr,
            remote_rloc: IpAddr,
            port: u16,
            nonce: Nonce,
            _opts: MapReplyOpts,
        ) -> Result<(), ReplyError> {
            if self.fail {
                return Err(ReplyError::Transmit(std::io::Error::other("unreachable")));
            }
            self.sent.push(Sent {
                mapping: mapping.clone(),
                local: local_rloc,
                remote: remote_rloc,
                port,
                nonce,
            });
            Ok(())
        }
    }

    fn addr(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    fn map_server() -> ControlDevice {
        let mut db = LocalDb::new();
        db.add(
            Mapping::new(Prefix::from_str("10.0.0.0/24").unwrap())
                .with_locator(Locator::new(addr("192.0.2.1"), 1, 100).unwrap()),
        );
        ControlDevice::MapServer(MapServer::new(db))
    }

    fn request(flags: MapRequestFlags, itr_rlocs: &[&str], records: &[(&str, u8)]) -> Vec<u8> {
        let request = MapRequest {
            flags,
            nonce: 0x1122_3344_5566_7788,
            source_eid: LispAddr::Ip(addr("10.9.0.1")),
            itr_rlocs: itr_rlocs.iter().map(|a| LispAddr::Ip(addr(a))).collect(),
            records: records
                .iter()
                .map(|(eid, mask_len)| EidRecord {
                    mask_len: *mask_len,
                    eid: LispAddr::Ip(addr(eid)),
                })
                .collect(),
        };
        to_vec(&request).unwrap()
    }

    fn process(
        device: &ControlDevice,
        msg: &[u8],
        replies: &mut Recorder,
        map_cache: &mut MapCache,
    ) -> Result<ControlOutcome, ControlError> {
        let mut ctx = ControlContext {
            local_rloc: addr("192.0.2.1"),
            remote_port: 61000,
            now: Instant::now(),
            replies,
            map_cache,
        };
        device.process_control_message(msg, &mut ctx)
    }

    #[test]
    fn answers_with_the_requested_prefix() {
        let device = map_server();
        let mut replies = Recorder::default();
        let msg = request(MapRequestFlags::empty(), &["192.0.2.9"], &[("10.0.0.5", 32)]);
        let outcome = process(&device, &msg, &mut replies, &mut MapCache::new()).unwrap();
        assert_eq!(outcome, ControlOutcome::Answered { replies: 1, unknown: 0 });

        let sent = &replies.sent[0];
        assert_eq!(sent.remote, addr("192.0.2.9"));
        assert_eq!(sent.local, addr("192.0.2.1"));
        assert_eq!(sent.port, 61000);
        assert_eq!(sent.nonce.as_u64(), 0x1122_3344_5566_7788);
        assert_eq!(
            sent.mapping.eid(),
            &EidKey::Ip(Prefix::from_str("10.0.0.5/32").unwrap())
        );
        let locators = sent.mapping.locators(Afi::Ipv4);
        assert_eq!(locators.len(), 1);
        assert_eq!(locators[0].addr(), addr("192.0.2.1"));
        assert_eq!((locators[0].priority(), locators[0].weight()), (1, 100));
    }

    #[test]
    #[traced_test]
    fn missing_records_do_not_fail_the_request() {
        let device = map_server();
        let mut replies = Recorder::default();
        let msg = request(
            MapRequestFlags::empty(),
            &["2001:db8::9", "192.0.2.9"],
            &[("10.0.0.7", 32), ("172.16.0.1", 32), ("10.0.0.0", 25)],
        );
        let outcome = process(&device, &msg, &mut replies, &mut MapCache::new()).unwrap();
        assert_eq!(outcome, ControlOutcome::Answered { replies: 2, unknown: 1 });
        assert!(replies.sent.iter().all(|s| s.remote == addr("192.0.2.9")));
        assert!(logs_contain("No mapping for requested EID 172.16.0.1/32"));
    }

    #[test]
    #[traced_test]
    fn send_failures_are_logged() {
        let device = map_server();
        let mut replies = Recorder {
            fail: true,
            ..Default::default()
        };
        let msg = request(MapRequestFlags::empty(), &["192.0.2.9"], &[("10.0.0.5", 32)]);
        let outcome = process(&device, &msg, &mut replies, &mut MapCache::new()).unwrap();
        assert_eq!(outcome, ControlOutcome::Answered { replies: 0, unknown: 0 });
        assert!(logs_contain("Failed to answer 192.0.2.9"));
    }

    #[test]
    fn rejects_probes_and_smr() {
        let device = map_server();
        let mut replies = Recorder::default();
        let probe = request(MapRequestFlags::PROBE, &["192.0.2.9"], &[("10.0.0.5", 32)]);
        assert!(matches!(
            process(&device, &probe, &mut replies, &mut MapCache::new()),
            Err(ControlError::ProbeBitSet)
        ));
        let smr = request(MapRequestFlags::SMR, &["192.0.2.9"], &[("10.0.0.5", 32)]);
        assert!(matches!(
            process(&device, &smr, &mut replies, &mut MapCache::new()),
            Err(ControlError::SmrBitSet)
        ));
        assert!(replies.sent.is_empty());
    }

    #[test]
    fn needs_an_itr_rloc_of_the_local_family() {
        let device = map_server();
        let mut replies = Recorder::default();
        let msg = request(MapRequestFlags::empty(), &["2001:db8::9"], &[("10.0.0.5", 32)]);
        assert!(matches!(
            process(&device, &msg, &mut replies, &mut MapCache::new()),
            Err(ControlError::NoItrRloc(Afi::Ipv4))
        ));
    }

    #[test]
    #[traced_test]
    fn other_messages_are_discarded() {
        let device = map_server();
        let mut replies = Recorder::default();
        let mut cache = MapCache::new();
        for (byte, kind) in [
            (0x30, ControlType::MapRegister),
            (0x20, ControlType::MapReply),
            (0x40, ControlType::MapNotify),
            (0x70, ControlType::InfoNat),
        ] {
            let outcome = process(&device, &[byte, 0, 0, 0], &mut replies, &mut cache).unwrap();
            assert_eq!(outcome, ControlOutcome::Discarded(kind));
        }
        assert!(logs_contain("Map-Register handling is not implemented"));
        assert!(matches!(
            process(&device, &[0x80, 0, 0, 0], &mut replies, &mut cache),
            Err(ControlError::Unsupported(ControlType::EncapsulatedControl))
        ));
        assert!(matches!(
            process(&device, &[0x50, 0, 0, 0], &mut replies, &mut cache),
            Err(ControlError::Parse(_))
        ));
        assert!(matches!(
            process(&device, &[], &mut replies, &mut cache),
            Err(ControlError::Parse(_))
        ));
    }

    #[test]
    fn truncated_requests_are_rejected() {
        let device = map_server();
        let msg = request(MapRequestFlags::empty(), &["192.0.2.9"], &[("10.0.0.5", 32)]);
        let mut replies = Recorder::default();
        assert!(matches!(
            process(&device, &msg[..msg.len() - 3], &mut replies, &mut MapCache::new()),
            Err(ControlError::Parse(_))
        ));
    }

    #[test]
    fn unsupported_roles() {
        let mut replies = Recorder::default();
        let msg = request(MapRequestFlags::empty(), &["192.0.2.9"], &[("10.0.0.5", 32)]);
        for device in [ControlDevice::MapResolver, ControlDevice::Rtr] {
            assert!(matches!(
                process(&device, &msg, &mut replies, &mut MapCache::new()),
                Err(ControlError::UnsupportedRole(_))
            ));
        }
    }

    #[test]
    fn mobile_node_caches_answered_requests() {
        let device = ControlDevice::MobileNode(MobileNode::default());
        let mut replies = Recorder::default();
        let mut cache = MapCache::new();
        let eid = EidKey::Ip(Prefix::from_str("198.51.100.0/24").unwrap());
        let nonce = Nonce::from(42);
        cache
            .register_request(eid, nonce, Instant::now(), Duration::from_secs(1))
            .unwrap();

        let mapping =
            Mapping::new(eid).with_locator(Locator::new(addr("203.0.113.1"), 1, 100).unwrap());
        let stray = build_map_reply(&mapping, Nonce::from(7), MapReplyOpts::default(), 10).unwrap();
        let outcome = process(&device, &stray, &mut replies, &mut cache).unwrap();
        assert_eq!(outcome, ControlOutcome::Cached { accepted: 0, ignored: 1 });
        assert!(cache.lookup_usable(&EidKey::from(addr("198.51.100.7"))).is_none());

        let msg = build_map_reply(&mapping, nonce, MapReplyOpts::default(), 10).unwrap();
        let outcome = process(&device, &msg, &mut replies, &mut cache).unwrap();
        assert_eq!(outcome, ControlOutcome::Cached { accepted: 1, ignored: 0 });
        let cached = cache.lookup_usable(&EidKey::from(addr("198.51.100.7"))).unwrap();
        assert_eq!(cached.locator_count(), 1);
        let entry = cache.lookup_exact(&eid).unwrap();
        assert_eq!(entry.ttl(), Duration::from_secs(600));

        let request = request(MapRequestFlags::empty(), &["192.0.2.9"], &[("10.0.0.5", 32)]);
        assert_eq!(
            process(&device, &request, &mut replies, &mut cache).unwrap(),
            ControlOutcome::Discarded(ControlType::MapRequest)
        );
    }
}

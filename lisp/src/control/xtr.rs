// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping resolution by an xTR: Map-Requests out, Map-Replies in

use crate::control::ControlOutcome;
use crate::control::reply::mapping_from_record;
use crate::errors::{MapCacheError, RequestError};
use crate::mapcache::{MapCache, ReplyOutcome};
use crate::mapping::EidKey;
use crate::nonce::Nonce;
use arrayvec::ArrayVec;
use net::lisp::control::{
    EidRecord, LispAddr, MapReply, MapRequest, MapRequestFlags, to_vec,
};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Time to wait for a Map-Reply before asking again
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// An xTR learning mappings from the replies to its own Map-Requests
#[derive(Debug)]
pub struct MobileNode {
    retry_interval: Duration,
}

impl Default for MobileNode {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL)
    }
}

impl MobileNode {
    #[must_use]
    pub fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Build a Map-Request for `eid`, answerable at `itr_rloc`, and record it in the map
    /// cache so that the reply is accepted.
    ///
    /// # Errors
    ///
    /// Fails for multicast EIDs, for static entries, when the entry has used up its
    /// requests, and if no nonce or message can be built.
    pub fn request_mapping(
        &self,
        eid: EidKey,
        itr_rloc: IpAddr,
        map_cache: &mut MapCache,
        now: Instant,
    ) -> Result<Vec<u8>, RequestError> {
        let EidKey::Ip(prefix) = eid else {
            return Err(RequestError::UnsupportedEid(eid));
        };
        let nonce = Nonce::build_time()?;
        map_cache.register_request(eid, nonce, now, self.retry_interval)?;
        let mut itr_rlocs = ArrayVec::new();
        itr_rlocs.push(LispAddr::Ip(itr_rloc));
        let request = MapRequest {
            flags: MapRequestFlags::empty(),
            nonce: nonce.as_u64(),
            source_eid: LispAddr::NoAddress,
            itr_rlocs,
            records: vec![EidRecord {
                mask_len: prefix.length(),
                eid: LispAddr::Ip(prefix.as_address()),
            }],
        };
        Ok(to_vec(&request)?)
    }

    /// Feed the records of a Map-Reply into the map cache.
    ///
    /// Records are only accepted if the cache waits for the nonce of the reply. Record TTLs
    /// are in minutes.
    pub fn process_map_reply(
        &self,
        reply: &MapReply,
        map_cache: &mut MapCache,
        now: Instant,
    ) -> ControlOutcome {
        let nonce = Nonce::from(reply.nonce);
        let mut accepted = 0;
        let mut ignored = 0;
        for record in &reply.records {
            let mapping = match mapping_from_record(record) {
                Ok(mapping) => mapping,
                Err(e) => {
                    warn!("Ignoring map-reply record: {e}");
                    ignored += 1;
                    continue;
                }
            };
            let ttl = Duration::from_secs(u64::from(record.ttl) * 60);
            let eid = *mapping.eid();
            match map_cache.process_reply(eid, mapping, nonce, ttl, now) {
                Ok(ReplyOutcome::Activated) => accepted += 1,
                Ok(ReplyOutcome::UnknownNonce) => ignored += 1,
                Err(e @ MapCacheError::StaticEntry(_)) => {
                    debug!("Ignoring map-reply record: {e}");
                    ignored += 1;
                }
                Err(e) => {
                    warn!("Failed to cache map-reply record for {eid}: {e}");
                    ignored += 1;
                }
            }
        }
        ControlOutcome::Cached { accepted, ignored }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use crate::control::ControlOutcome;
    use crate::control::reply::{MapReplyOpts, build_map_reply};
    use crate::control::xtr::MobileNode;
    use crate::errors::{MapCacheError, RequestError};
    use crate::locator::Locator;
    use crate::mapcache::{MapCache, MapCacheEvent};
    use crate::mapping::{EidKey, Mapping};
    use crate::nonce::Nonce;
    use lpm::prefix::Prefix;
    use net::lisp::control::{LispAddr, MapReply, MapRequest};
    use net::parse::Parse;
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::time::{Duration, Instant};

    fn eid(s: &str) -> EidKey {
        EidKey::Ip(Prefix::from_str(s).unwrap())
    }

    #[test]
    fn request_then_reply() {
        let node = MobileNode::new(Duration::from_secs(2));
        let mut cache = MapCache::new();
        let now = Instant::now();
        let itr = IpAddr::from([192, 0, 2, 1]);
        let bytes = node
            .request_mapping(eid("198.51.100.7/32"), itr, &mut cache, now)
            .unwrap();
        let (request, _) = MapRequest::parse(&bytes).unwrap();
        assert_eq!(request.itr_rlocs.as_slice(), &[LispAddr::Ip(itr)]);
        assert_eq!(request.records[0].mask_len, 32);
        let pending = cache.lookup_exact(&eid("198.51.100.7/32")).unwrap();
        assert!(!pending.is_active());
        assert_eq!(pending.nonces().len(), 1);

        // answered for the covering /24
        let mapping = Mapping::new(eid("198.51.100.0/24"))
            .with_locator(Locator::new(IpAddr::from([203, 0, 113, 1]), 1, 100).unwrap());
        let reply = build_map_reply(&mapping, Nonce::from(request.nonce), MapReplyOpts::default(), 1)
            .unwrap();
        let (reply, _) = MapReply::parse(&reply).unwrap();
        let outcome = node.process_map_reply(&reply, &mut cache, now);
        assert_eq!(outcome, ControlOutcome::Cached { accepted: 1, ignored: 0 });
        assert!(cache.lookup_exact(&eid("198.51.100.7/32")).is_none());
        let entry = cache.lookup_exact(&eid("198.51.100.0/24")).unwrap();
        assert!(entry.is_usable());
        assert_eq!(entry.ttl(), Duration::from_secs(60));

        assert!(cache.expire(now + Duration::from_secs(59)).is_empty());
        assert_eq!(
            cache.expire(now + Duration::from_secs(60)),
            vec![MapCacheEvent::Expired(eid("198.51.100.0/24"))]
        );
    }

    #[test]
    fn retries_are_bounded() {
        let node = MobileNode::default();
        let mut cache = MapCache::new();
        let now = Instant::now();
        let itr = IpAddr::from([192, 0, 2, 1]);
        let target = eid("198.51.100.7/32");
        for _ in 0..3 {
            node.request_mapping(target, itr, &mut cache, now).unwrap();
        }
        let err = node.request_mapping(target, itr, &mut cache, now).unwrap_err();
        assert!(matches!(
            err,
            RequestError::MapCache(MapCacheError::RetryBudgetExhausted(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn multicast_is_not_requested() {
        let sg = EidKey::sg(
            Prefix::from_str("10.0.0.1").unwrap(),
            Prefix::from_str("239.1.1.1").unwrap(),
        )
        .unwrap();
        let err = MobileNode::default()
            .request_mapping(sg, IpAddr::from([192, 0, 2, 1]), &mut MapCache::new(), Instant::now())
            .unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedEid(_)));
    }
}

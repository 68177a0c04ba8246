// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Map-Server: answers Map-Requests for the EIDs of the local database

use crate::control::ControlOutcome;
use crate::control::reply::{MapReplyOpts, MapReplySender};
use crate::database::LocalDb;
use crate::errors::ControlError;
use crate::mapping::EidKey;
use crate::nonce::Nonce;
use lpm::prefix::Prefix;
use net::ip::Afi;
use net::lisp::control::MapRequest;
use std::net::IpAddr;
use tracing::{debug, error, warn};

use tracectl::trace_target;
trace_target!("map-server", LevelFilter::INFO, &["lisp", "control"]);

#[derive(Debug, Default)]
pub struct MapServer {
    db: LocalDb,
}

impl MapServer {
    #[must_use]
    pub fn new(db: LocalDb) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &LocalDb {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut LocalDb {
        &mut self.db
    }

    /// Answer a Map-Request.
    ///
    /// Each record is answered by its own Map-Reply, sent to the first ITR-RLOC of the
    /// family of `local_rloc`. Records without a covering mapping are skipped, and so are
    /// replies which fail to go out: the request as a whole succeeds once it is parsed.
    ///
    /// # Errors
    ///
    /// Rejects RLOC probes, solicited requests and requests without a usable ITR-RLOC.
    pub fn process_map_request(
        &self,
        request: &MapRequest,
        local_rloc: IpAddr,
        remote_port: u16,
        replies: &mut dyn MapReplySender,
    ) -> Result<ControlOutcome, ControlError> {
        if request.is_probe() {
            return Err(ControlError::ProbeBitSet);
        }
        if request.is_smr() {
            return Err(ControlError::SmrBitSet);
        }
        let afi = Afi::of(&local_rloc);
        let itr_rloc = request
            .itr_rlocs
            .iter()
            .filter_map(|rloc| rloc.ip())
            .find(|ip| Afi::of(ip) == afi)
            .ok_or(ControlError::NoItrRloc(afi))?;
        let nonce = Nonce::from(request.nonce);
        debug!(
            "Map-request from {} ({itr_rloc}) for {} records, nonce {nonce}",
            request.source_eid,
            request.records.len()
        );

        let mut sent = 0;
        let mut unknown = 0;
        for record in &request.records {
            let Some(addr) = record.eid.ip() else {
                warn!("Skipping unsupported EID {}", record.eid);
                unknown += 1;
                continue;
            };
            let prefix = match Prefix::new(addr, record.mask_len) {
                Ok(prefix) => prefix,
                Err(e) => {
                    warn!("Skipping EID {addr}/{}: {e}", record.mask_len);
                    unknown += 1;
                    continue;
                }
            };
            let Some(mapping) = self.db.lookup(&EidKey::Ip(prefix)) else {
                debug!("No mapping for requested EID {prefix}");
                unknown += 1;
                continue;
            };
            let answer = mapping.with_eid(EidKey::Ip(prefix));
            match replies.build_and_send_map_reply(
                &answer,
                local_rloc,
                itr_rloc,
                remote_port,
                nonce,
                MapReplyOpts::default(),
            ) {
                Ok(()) => {
                    debug!("Map-reply for {prefix} sent to {itr_rloc}:{remote_port}");
                    sent += 1;
                }
                Err(e) => error!("Failed to answer {itr_rloc} for {prefix}: {e}"),
            }
        }
        Ok(ControlOutcome::Answered {
            replies: sent,
            unknown,
        })
    }
}

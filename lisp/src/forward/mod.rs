// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The tunnel output path.
//!
//! Each frame read from the tunnel device is classified, resolved to a forwarding entry,
//! encapsulated and sent. Frames which cannot be resolved leave natively. Multicast frames
//! are replicated by the head-end, one encapsulated copy per target.

pub mod io;

use crate::database::LocalDb;
use crate::errors::{OutputError, SelectError};
use crate::mapcache::MapCache;
use crate::mapping::{EidKey, Mapping};
use crate::select::{self, ForwardingEntry};
use derive_builder::Builder;
use io::{ReencapResolver, ReplicationResolver, ReplicationTarget, SocketTable, TunDevice};
use net::ip::Afi;
use net::lisp::DATA_PORT;
use net::lisp::encap::encapsulate;
use net::tuple::{PacketTuple, destination_address, extract_tuple, is_lisp_encapsulated};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, error, warn};

use tracectl::trace_target;
trace_target!("lisp-output", LevelFilter::INFO, &["lisp", "dataplane"]);

/// Largest frame read from the tunnel device
pub const MAX_FRAME: usize = 9216;

/// Role of the node on the data path
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Ingress tunnel router: encapsulates traffic of local EIDs
    #[default]
    Xtr,
    /// Re-encapsulating router: relays traffic of nodes behind NATs
    Rtr,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Xtr => write!(f, "xTR"),
            Mode::Rtr => write!(f, "RTR"),
        }
    }
}

/// What happened to an output packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Sent as is
    Native,
    /// Sent encapsulated
    Encapsulated(ForwardingEntry),
    /// Multicast packet replicated to each target
    Replicated { sent: usize, failed: usize },
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct ForwardingEngine<S: SocketTable> {
    local_db: LocalDb,
    #[builder(default)]
    map_cache: MapCache,
    /// Proxy ETRs, used for destinations without a mapping
    #[builder(default, setter(strip_option))]
    petr: Option<Mapping>,
    #[builder(default)]
    mode: Mode,
    sockets: S,
    #[builder(default, setter(strip_option))]
    replication: Option<Box<dyn ReplicationResolver>>,
    #[builder(default, setter(strip_option))]
    reencap: Option<Box<dyn ReencapResolver>>,
}

impl<S: SocketTable> ForwardingEngine<S> {
    /// Forward one packet read from the tunnel device.
    ///
    /// # Errors
    ///
    /// The packet is dropped if it is not an IP packet, if no locator family is shared
    /// with the destination, or if it cannot be encapsulated or sent.
    pub fn lisp_output(&mut self, packet: &[u8]) -> Result<Verdict, OutputError> {
        let tuple = extract_tuple(packet).inspect_err(|e| debug!("Dropping packet: {e}"))?;
        debug!("Output {tuple}");

        if is_lisp_encapsulated(packet) {
            debug!("Packet is LISP already, forwarding natively");
            return self.forward_native(packet);
        }
        if tuple.dst().is_multicast() {
            return self.output_multicast(&tuple, packet);
        }
        let resolved = match self.mode {
            Mode::Rtr => self
                .reencap
                .as_ref()
                .and_then(|resolver| resolver.forwarding_entry(&tuple))
                .map(|entry| (entry, 0)),
            Mode::Xtr => self.resolve(&tuple)?,
        };
        let Some((entry, instance_id)) = resolved else {
            return self.forward_native(packet);
        };
        self.send_encapsulated(&entry, packet, instance_id)?;
        debug!("Encapsulated {tuple} as {entry}");
        Ok(Verdict::Encapsulated(entry))
    }

    /// Read one frame from `device` and forward it.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be read, and as [`ForwardingEngine::lisp_output`].
    pub fn process_output_packet<T: TunDevice>(
        &mut self,
        device: &mut T,
    ) -> Result<Verdict, OutputError> {
        let mut buf = vec![0u8; MAX_FRAME];
        let len = device.read_frame(&mut buf).map_err(OutputError::Read)?;
        if len == 0 {
            warn!("Empty read from the tunnel device");
            return Err(OutputError::Read(std::io::ErrorKind::UnexpectedEof.into()));
        }
        let Some(frame) = buf.get(..len) else {
            warn!("Tunnel device reported a {len} byte frame, larger than {MAX_FRAME}");
            return Err(OutputError::Read(std::io::ErrorKind::InvalidData.into()));
        };
        self.lisp_output(frame)
    }

    // None means native forwarding
    fn resolve(&self, tuple: &PacketTuple) -> Result<Option<(ForwardingEntry, u32)>, OutputError> {
        let Some(src_mapping) = self.local_db.lookup_addr(tuple.src()) else {
            debug!("{} is not a local EID", tuple.src());
            return Ok(None);
        };
        let key = EidKey::of_tuple(tuple);
        let dst_mapping = match (self.map_cache.lookup_usable(&key), &self.petr) {
            (Some(mapping), _) => mapping,
            (None, Some(petr)) => {
                debug!("No usable mapping for {key}, using proxy ETRs");
                petr
            }
            (None, None) => {
                debug!("No usable mapping for {key}");
                return Ok(None);
            }
        };
        match select::forwarding_entry(src_mapping, dst_mapping, tuple) {
            Ok(entry) => Ok(Some((entry, src_mapping.instance_id()))),
            Err(SelectError::NoLocator) => {
                debug!("No usable local locator for {}", tuple.src());
                Ok(None)
            }
            Err(SelectError::NoCompatibleAfi) => {
                warn!(
                    "Dropping {tuple}: no locator family shared with {}",
                    dst_mapping.eid()
                );
                Err(OutputError::NoCompatibleAfi)
            }
        }
    }

    fn send_encapsulated(
        &mut self,
        entry: &ForwardingEntry,
        packet: &[u8],
        instance_id: u32,
    ) -> Result<(), OutputError> {
        let outer = encapsulate(packet, entry.src, entry.dst, DATA_PORT, DATA_PORT, instance_id)
            .inspect_err(|e| warn!("Failed to encapsulate: {e}"))?;
        let socket = match &entry.socket {
            Some(socket) => socket.clone(),
            None => self
                .sockets
                .socket_for(entry.src)
                .ok_or(OutputError::NoSocket(entry.src))?,
        };
        self.sockets.send(&socket, &outer).map_err(|err| {
            error!("Failed to send on {socket}: {err}");
            OutputError::Transmit { socket, err }
        })
    }

    fn output_multicast(&mut self, tuple: &PacketTuple, packet: &[u8]) -> Result<Verdict, OutputError> {
        let targets = self
            .replication
            .as_ref()
            .map(|resolver| resolver.resolve_output_rlocs(tuple.src(), tuple.dst()))
            .unwrap_or_default();
        if targets.is_empty() {
            debug!("No replication list for ({}, {})", tuple.src(), tuple.dst());
            return Err(OutputError::NoReplicationTargets(tuple.dst()));
        }
        let (mut sent, mut failed) = (0, 0);
        for target in targets {
            match self.replicate(target, packet) {
                Ok(()) => sent += 1,
                Err(e) => {
                    error!("Failed to replicate to {}: {e}", target.dst);
                    failed += 1;
                }
            }
        }
        debug!("Replicated {tuple} to {sent} targets, {failed} failed");
        Ok(Verdict::Replicated { sent, failed })
    }

    fn replicate(&mut self, target: ReplicationTarget, packet: &[u8]) -> Result<(), OutputError> {
        let entry = ForwardingEntry {
            src: target.src,
            dst: target.dst,
            socket: None,
        };
        self.send_encapsulated(&entry, packet, 0)
    }

    fn forward_native(&mut self, packet: &[u8]) -> Result<Verdict, OutputError> {
        let afi = Afi::of(&destination_address(packet)?);
        self.sockets.send_native(afi, packet).map_err(|err| {
            error!("Failed to forward natively: {err}");
            OutputError::Native { afi, err }
        })?;
        Ok(Verdict::Native)
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn local_db(&self) -> &LocalDb {
        &self.local_db
    }

    pub fn local_db_mut(&mut self) -> &mut LocalDb {
        &mut self.local_db
    }

    #[must_use]
    pub fn map_cache(&self) -> &MapCache {
        &self.map_cache
    }

    pub fn map_cache_mut(&mut self) -> &mut MapCache {
        &mut self.map_cache
    }

    #[must_use]
    pub fn petr(&self) -> Option<&Mapping> {
        self.petr.as_ref()
    }

    pub fn set_petr(&mut self, petr: Option<Mapping>) {
        self.petr = petr;
    }

    #[must_use]
    pub fn sockets(&self) -> &S {
        &self.sockets
    }

    pub fn sockets_mut(&mut self) -> &mut S {
        &mut self.sockets
    }
}

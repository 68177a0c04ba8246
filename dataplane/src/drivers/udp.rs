// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control socket driver: a single-threaded mio loop receiving control messages and
//! running the map-cache timers

use crate::config::Node;
use lisp::ReplyError;
use lisp::control::reply::{DEFAULT_REPLY_TTL, MapReplyOpts, MapReplySender, build_map_reply};
use lisp::control::{ControlContext, ControlDevice};
use lisp::mapcache::MapCacheEvent;
use lisp::mapping::{EidKey, Mapping};
use lisp::nonce::Nonce;
use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};
use net::lisp::CONTROL_PORT;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const CONTROL: Token = Token(0);
const MAX_CONTROL_MSG: usize = 4096;
const MAX_POLL_WAIT: Duration = Duration::from_secs(1);

/// Sends Map-Replies on the control socket
pub struct UdpReplySender<'s> {
    socket: &'s UdpSocket,
}

impl<'s> UdpReplySender<'s> {
    pub fn new(socket: &'s UdpSocket) -> Self {
        Self { socket }
    }
}

impl MapReplySender for UdpReplySender<'_> {
    fn build_and_send_map_reply(
        &mut self,
        mapping: &Mapping,
        local_rloc: IpAddr,
        remote_rloc: IpAddr,
        port: u16,
        nonce: Nonce,
        opts: MapReplyOpts,
    ) -> Result<(), ReplyError> {
        let reply = build_map_reply(mapping, nonce, opts, DEFAULT_REPLY_TTL)?;
        self.socket
            .send_to(&reply, SocketAddr::new(remote_rloc, port))?;
        debug!(
            "Sent map-reply for {} from {local_rloc} to {remote_rloc}:{port}",
            mapping.eid()
        );
        Ok(())
    }
}

pub struct ControlLoop {
    poll: Poll,
    events: Events,
    socket: UdpSocket,
    node: Node,
    buf: Vec<u8>,
}

impl ControlLoop {
    /// Bind the control socket and register it.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be bound or polled.
    pub fn new(node: Node, bind: SocketAddr) -> std::io::Result<Self> {
        let poll = Poll::new()?;
        let mut socket = UdpSocket::bind(bind)?;
        poll.registry()
            .register(&mut socket, CONTROL, Interest::READABLE)?;
        info!("Control socket listening at {}", socket.local_addr()?);
        Ok(Self {
            poll,
            events: Events::with_capacity(64),
            socket,
            node,
            buf: vec![0; MAX_CONTROL_MSG],
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send the initial Map-Requests, then serve until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        for eid in self.node.resolve.clone() {
            self.send_map_request(eid);
        }
        info!("Entering control loop...");
        while !stop.load(Ordering::Relaxed) {
            self.poll_once();
        }
        info!("Control loop stopped");
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        self.node
            .map_cache
            .next_deadline()
            .map_or(MAX_POLL_WAIT, |deadline| {
                deadline.saturating_duration_since(now).min(MAX_POLL_WAIT)
            })
    }

    /// Wait for messages or the next timer, and handle what is due. Returns the number of
    /// control messages received.
    pub fn poll_once(&mut self) -> usize {
        let timeout = self.poll_timeout(Instant::now());
        if let Err(e) = self.poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() != ErrorKind::Interrupted {
                error!("Poller error!: {e}");
            }
            return 0;
        }
        let readable = self
            .events
            .iter()
            .any(|event| event.token() == CONTROL && event.is_readable());
        let received = if readable { self.drain_socket() } else { 0 };
        self.run_timers(Instant::now());
        received
    }

    fn drain_socket(&mut self) -> usize {
        let mut received = 0;
        loop {
            let (len, peer) = match self.socket.recv_from(&mut self.buf) {
                Ok(datagram) => datagram,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Failed to receive on control socket: {e}");
                    break;
                }
            };
            received += 1;
            let mut replies = UdpReplySender::new(&self.socket);
            let mut ctx = ControlContext {
                local_rloc: self.node.local_rloc,
                remote_port: peer.port(),
                now: Instant::now(),
                replies: &mut replies,
                map_cache: &mut self.node.map_cache,
            };
            match self
                .node
                .control
                .process_control_message(&self.buf[..len], &mut ctx)
            {
                Ok(outcome) => debug!("Control message from {peer}: {outcome:?}"),
                Err(e) => warn!("Dropping control message from {peer}: {e}"),
            }
        }
        received
    }

    fn run_timers(&mut self, now: Instant) {
        for event in self.node.map_cache.expire(now) {
            let eid = match event {
                MapCacheEvent::Expired(eid) | MapCacheEvent::SmrInvalidation(eid) => eid,
                MapCacheEvent::RetryDue { eid, attempts } => {
                    debug!("No reply for {eid} after {attempts} map-requests");
                    eid
                }
            };
            self.send_map_request(eid);
        }
    }

    fn send_map_request(&mut self, eid: EidKey) {
        let ControlDevice::MobileNode(xtr) = &self.node.control else {
            return;
        };
        let Some(resolver) = self.node.map_resolver else {
            debug!("No map-resolver to resolve {eid}");
            return;
        };
        let request = match xtr.request_mapping(
            eid,
            self.node.local_rloc,
            &mut self.node.map_cache,
            Instant::now(),
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!("Not resolving {eid}: {e}");
                return;
            }
        };
        let to = SocketAddr::new(resolver, CONTROL_PORT.as_u16());
        match self.socket.send_to(&request, to) {
            Ok(_) => debug!("Sent map-request for {eid} to {to}"),
            Err(e) => error!("Failed to send map-request for {eid} to {to}: {e}"),
        }
    }
}

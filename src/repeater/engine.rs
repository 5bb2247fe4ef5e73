//! The repeater context: construction API, lifecycle, and forwarding loop.

use std::fmt::Write as _;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::error::{EntityKind, RepeaterError, RepeaterResult};
use super::registry::{Registry, Target, Transmitter};
use super::socket::{SocketPool, SocketTag, MAX_DATAGRAM_SIZE};
use super::table::{Map, RoutingTable};
use super::validate;

/// Lifecycle phase of a [`Repeater`]. Transitions are linear
/// (`Configuring → Validating → Running`) with no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting entity-creation calls, in any order and any mix.
    Configuring,
    /// Running the one-shot referential-integrity check.
    Validating,
    /// Serving. The registry and routing table are immutable from here on.
    Running,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Self::Configuring => "configuring",
            Self::Validating => "validating",
            Self::Running => "running",
        }
    }
}

/// Snapshot of forwarding counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeaterStats {
    /// Datagrams received on listener sockets.
    pub datagrams_received: u64,
    /// Datagrams sent to targets (counted per match).
    pub datagrams_forwarded: u64,
    /// Datagrams received on transmitter sockets and discarded.
    pub datagrams_discarded: u64,
    /// Receive failures.
    pub recv_errors: u64,
    /// Send failures, each a single dropped packet for one match.
    pub send_errors: u64,
    /// Matches skipped because a target or transmitter did not resolve.
    pub resolve_errors: u64,
}

#[derive(Default)]
struct StatsInner {
    datagrams_received: AtomicU64,
    datagrams_forwarded: AtomicU64,
    datagrams_discarded: AtomicU64,
    recv_errors: AtomicU64,
    send_errors: AtomicU64,
    resolve_errors: AtomicU64,
}

/// The repeater: entity registry, routing table, socket pool, and the
/// forwarding loop, behind one explicit context object.
///
/// Build one with [`Repeater::new`], populate it with the four `create_*`
/// calls, then hand control to [`Repeater::start`]. All configuration is
/// single-threaded and finishes before serving begins; nothing is mutated
/// once [`Phase::Running`] is entered.
pub struct Repeater {
    phase: Phase,
    registry: Registry,
    table: RoutingTable,
    sockets: SocketPool,
    stats: StatsInner,
}

impl Default for Repeater {
    fn default() -> Self {
        Self::new()
    }
}

impl Repeater {
    /// Create an empty repeater in the Configuring phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Configuring,
            registry: Registry::new(),
            table: RoutingTable::new(),
            sockets: SocketPool::new(),
            stats: StatsInner::default(),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn ensure_configuring(&self) -> RepeaterResult<()> {
        if self.phase != Phase::Configuring {
            return Err(RepeaterError::WrongPhase {
                current: self.phase.name(),
                expected: Phase::Configuring.name(),
            });
        }
        Ok(())
    }

    /// Create a listening socket bound to `address:port` and tag it with the
    /// routing id. The address may be unspecified (any); the port is
    /// required and must lie strictly between 1024 and 65536.
    ///
    /// # Errors
    ///
    /// Fatal configuration errors: zero or duplicate id, bad port, socket
    /// creation/bind failure, socket ceiling reached, wrong phase.
    pub fn create_listener(&mut self, id: u32, address: Ipv4Addr, port: u16) -> RepeaterResult<()> {
        self.ensure_configuring()?;
        if id == 0 {
            return Err(RepeaterError::ZeroId {
                kind: EntityKind::Listener,
            });
        }
        if self.sockets.listener_ids().contains(&id) {
            return Err(RepeaterError::DuplicateId {
                kind: EntityKind::Listener,
                id,
            });
        }
        self.sockets.add_listener(id, address, port)
    }

    /// Create a transmitter: an outbound socket, bound only if address or
    /// port is nonzero, registered under the given id.
    ///
    /// # Errors
    ///
    /// Fatal configuration errors: zero or duplicate id, bad port, socket
    /// creation/bind failure, socket ceiling reached, wrong phase.
    pub fn create_transmitter(
        &mut self,
        id: u32,
        address: Ipv4Addr,
        port: u16,
    ) -> RepeaterResult<()> {
        self.ensure_configuring()?;
        if id == 0 {
            return Err(RepeaterError::ZeroId {
                kind: EntityKind::Transmitter,
            });
        }
        // Check before opening the socket so a duplicate id does not leave
        // an orphaned entry in the pool.
        if self.registry.transmitter(id).is_some() {
            return Err(RepeaterError::DuplicateId {
                kind: EntityKind::Transmitter,
                id,
            });
        }
        let socket = self.sockets.add_transmitter(address, port)?;
        self.registry.insert_transmitter(Transmitter::new(id, socket))
    }

    /// Create a target: a destination address/port and the transmitter used
    /// to reach it. The transmitter need not exist yet; validation checks
    /// the reference.
    ///
    /// # Errors
    ///
    /// Fatal configuration errors: zero or duplicate id, missing address,
    /// port, or transmitter reference, wrong phase.
    pub fn create_target(
        &mut self,
        id: u32,
        address: Ipv4Addr,
        port: u16,
        transmitter_id: u32,
    ) -> RepeaterResult<()> {
        self.ensure_configuring()?;
        if id == 0 {
            return Err(RepeaterError::ZeroId {
                kind: EntityKind::Target,
            });
        }
        if address.is_unspecified() {
            return Err(RepeaterError::TargetWithoutAddress { id });
        }
        if port == 0 {
            return Err(RepeaterError::TargetWithoutPort { id });
        }
        if transmitter_id == 0 {
            return Err(RepeaterError::TargetWithoutTransmitter { id });
        }
        self.registry.insert_target(Target {
            id,
            address,
            port,
            transmitter_id,
        })
    }

    /// Append a map rule. Neither the listener nor the target needs to exist
    /// at creation time; validation checks the target reference.
    ///
    /// # Errors
    ///
    /// Returns an error only when called outside the Configuring phase.
    pub fn create_map(
        &mut self,
        listener_id: u32,
        src_address: Ipv4Addr,
        src_port: u16,
        target_id: u32,
    ) -> RepeaterResult<()> {
        self.ensure_configuring()?;
        self.table.push(Map {
            listener_id,
            src_address,
            src_port,
            target_id,
        });
        Ok(())
    }

    /// Validate the configuration and serve forever.
    ///
    /// On a validation failure this returns without serving; on success it
    /// enters the Running phase and does not return under normal operation.
    /// A configuration with no sockets at all is rejected rather than
    /// parked: the readiness wait has nothing to wait on, and the pool
    /// cannot grow once serving has begun.
    ///
    /// # Errors
    ///
    /// Returns an error if validation finds violations (all are reported),
    /// if no sockets were configured, or if the readiness wait fails.
    pub async fn start(&mut self) -> RepeaterResult<()> {
        // The sender side is held here so the loop never observes shutdown.
        let (_shutdown_tx, shutdown_rx) = watch::channel(());
        self.start_with_shutdown(shutdown_rx).await
    }

    /// [`Repeater::start`] with an externally controlled stop signal: the
    /// loop exits cleanly when the paired sender sends or is dropped. This
    /// is the hook tests use to stop the loop deterministically.
    ///
    /// # Errors
    ///
    /// Same as [`Repeater::start`].
    pub async fn start_with_shutdown(
        &mut self,
        shutdown: watch::Receiver<()>,
    ) -> RepeaterResult<()> {
        self.ensure_configuring()?;
        self.phase = Phase::Validating;

        let violations = validate::verify(&self.registry, &self.table);
        if !violations.is_empty() {
            for violation in &violations {
                warn!(%violation, "config verification");
            }
            return Err(RepeaterError::Validation(violations));
        }
        if self.sockets.is_empty() {
            return Err(RepeaterError::NoSockets);
        }

        self.phase = Phase::Running;
        info!(
            listeners = self.sockets.listener_ids().len(),
            transmitters = self.registry.transmitter_count(),
            targets = self.registry.target_count(),
            maps = self.table.len(),
            "repeater running"
        );
        self.run(shutdown).await
    }

    /// The steady-state loop: wait for readiness, take one datagram from
    /// each ready socket, match and forward, wait again. Draining at most
    /// one datagram per socket per wakeup keeps a flood on one listener from
    /// starving the others.
    async fn run(&self, mut shutdown: watch::Receiver<()>) -> RepeaterResult<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                ready = self.sockets.wait_ready() => {
                    for index in ready? {
                        self.service_socket(index, &mut buf);
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested, repeater stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Receive a single datagram from the socket at `index` and forward it
    /// to every matching target. Nothing here aborts the loop.
    fn service_socket(&self, index: usize, buf: &mut [u8]) {
        let (socket, tag) = self.sockets.entry(index);

        let (len, src) = match socket.try_recv_from(buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return, // spurious wakeup
            Err(e) => {
                self.stats.recv_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, ?tag, "receive failed, skipping socket this wakeup");
                return;
            }
        };

        let listener_id = match tag {
            SocketTag::Listener(id) => id,
            SocketTag::Transmitter => {
                // Transmitter sockets are in the wait set only so errors
                // surface; their inbound data carries no routing meaning.
                self.stats.datagrams_discarded.fetch_add(1, Ordering::Relaxed);
                trace!(len, peer = %src, "discarding datagram on transmitter socket");
                return;
            }
        };

        let SocketAddr::V4(src) = src else {
            // The pool only opens IPv4 sockets.
            return;
        };
        self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
        debug!(listener = listener_id, peer = %src, len, "received datagram");

        for map in self.table.matching(listener_id, *src.ip(), src.port()) {
            self.forward(&buf[..len], map);
        }
    }

    /// Send a payload to one map's target. Failures are logged and skip only
    /// this match.
    fn forward(&self, payload: &[u8], map: &Map) {
        let Some(target) = self.registry.target(map.target_id) else {
            self.stats.resolve_errors.fetch_add(1, Ordering::Relaxed);
            warn!(target = map.target_id, "target not found, skipping match");
            return;
        };
        let Some(transmitter) = self.registry.transmitter(target.transmitter_id) else {
            self.stats.resolve_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                target = target.id,
                transmitter = target.transmitter_id,
                "transmitter not found, skipping match"
            );
            return;
        };

        let dest = SocketAddrV4::new(target.address, target.port);
        match transmitter.socket().try_send_to(payload, dest.into()) {
            Ok(sent) => {
                self.stats.datagrams_forwarded.fetch_add(1, Ordering::Relaxed);
                trace!(target = target.id, dest = %dest, sent, "forwarded datagram");
            }
            Err(e) => {
                // Includes would-block: a slow destination drops this one
                // packet, it never stalls the loop or other matches.
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, target = target.id, dest = %dest, "send failed, packet dropped");
            }
        }
    }

    /// Snapshot of the forwarding counters.
    #[must_use]
    pub fn stats(&self) -> RepeaterStats {
        RepeaterStats {
            datagrams_received: self.stats.datagrams_received.load(Ordering::Relaxed),
            datagrams_forwarded: self.stats.datagrams_forwarded.load(Ordering::Relaxed),
            datagrams_discarded: self.stats.datagrams_discarded.load(Ordering::Relaxed),
            recv_errors: self.stats.recv_errors.load(Ordering::Relaxed),
            send_errors: self.stats.send_errors.load(Ordering::Relaxed),
            resolve_errors: self.stats.resolve_errors.load(Ordering::Relaxed),
        }
    }

    /// Render the routing table for operator inspection, in insertion order.
    #[must_use]
    pub fn dump_maps(&self) -> String {
        let mut out = String::new();
        for (index, map) in self.table.maps().iter().enumerate() {
            let _ = writeln!(
                out,
                "map {index}: listener={} source={}:{} target={}",
                map.listener_id,
                fmt_addr(map.src_address),
                fmt_port(map.src_port),
                map.target_id
            );
        }
        out
    }

    /// Render the registered transmitters, sorted by id.
    #[must_use]
    pub fn dump_transmitters(&self) -> String {
        let mut out = String::new();
        for transmitter in self.registry.transmitters() {
            let local = transmitter
                .socket()
                .local_addr()
                .map_or_else(|_| "unbound".to_string(), |a| a.to_string());
            let _ = writeln!(out, "transmitter {}: socket={local}", transmitter.id);
        }
        out
    }

    /// Render the registered targets, sorted by id.
    #[must_use]
    pub fn dump_targets(&self) -> String {
        let mut out = String::new();
        for target in self.registry.targets() {
            let _ = writeln!(
                out,
                "target {}: destination={}:{} transmitter={}",
                target.id, target.address, target.port, target.transmitter_id
            );
        }
        out
    }
}

fn fmt_addr(address: Ipv4Addr) -> String {
    if address.is_unspecified() {
        "*".to_string()
    } else {
        address.to_string()
    }
}

fn fmt_port(port: u16) -> String {
    if port == 0 {
        "*".to_string()
    } else {
        port.to_string()
    }
}

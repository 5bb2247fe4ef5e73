//! Keyed stores for transmitters and targets.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use super::error::{EntityKind, RepeaterError, RepeaterResult};

/// An outbound socket, reusable across multiple targets.
#[derive(Debug, Clone)]
pub struct Transmitter {
    /// Positive, unique id.
    pub id: u32,
    socket: Arc<UdpSocket>,
}

impl Transmitter {
    /// Create a transmitter record wrapping an already-opened socket.
    #[must_use]
    pub fn new(id: u32, socket: Arc<UdpSocket>) -> Self {
        Self { id, socket }
    }

    /// The socket used to send packets for this transmitter.
    #[must_use]
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

/// A forwarding destination paired with the transmitter used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Positive, unique id.
    pub id: u32,
    /// Destination address of the forwarded packet.
    pub address: Ipv4Addr,
    /// Destination port of the forwarded packet.
    pub port: u16,
    /// Id of the transmitter to send through.
    pub transmitter_id: u32,
}

/// Registry of transmitters and targets, keyed by positive integer id.
///
/// Lookups are O(1) average; they run once per rule match on the forwarding
/// hot path. The registry is write-once: it is populated while configuring
/// and read-only for the rest of the process lifetime.
#[derive(Debug, Default)]
pub struct Registry {
    transmitters: HashMap<u32, Transmitter>,
    targets: HashMap<u32, Target>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transmitter.
    ///
    /// # Errors
    ///
    /// Returns an error on a zero or duplicate id. The registry is left
    /// unmodified on failure.
    pub fn insert_transmitter(&mut self, transmitter: Transmitter) -> RepeaterResult<()> {
        let id = transmitter.id;
        if id == 0 {
            return Err(RepeaterError::ZeroId {
                kind: EntityKind::Transmitter,
            });
        }
        if self.transmitters.contains_key(&id) {
            return Err(RepeaterError::DuplicateId {
                kind: EntityKind::Transmitter,
                id,
            });
        }
        self.transmitters.insert(id, transmitter);
        Ok(())
    }

    /// Register a target.
    ///
    /// # Errors
    ///
    /// Returns an error on a zero or duplicate id. The registry is left
    /// unmodified on failure.
    pub fn insert_target(&mut self, target: Target) -> RepeaterResult<()> {
        let id = target.id;
        if id == 0 {
            return Err(RepeaterError::ZeroId {
                kind: EntityKind::Target,
            });
        }
        if self.targets.contains_key(&id) {
            return Err(RepeaterError::DuplicateId {
                kind: EntityKind::Target,
                id,
            });
        }
        self.targets.insert(id, target);
        Ok(())
    }

    /// Look up a transmitter by id. Absence is not an error.
    #[must_use]
    pub fn transmitter(&self, id: u32) -> Option<&Transmitter> {
        self.transmitters.get(&id)
    }

    /// Look up a target by id. Absence is not an error.
    #[must_use]
    pub fn target(&self, id: u32) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// All transmitters, sorted by id for stable dump output.
    #[must_use]
    pub fn transmitters(&self) -> Vec<&Transmitter> {
        let mut all: Vec<_> = self.transmitters.values().collect();
        all.sort_by_key(|t| t.id);
        all
    }

    /// All targets, sorted by id for stable dump output.
    #[must_use]
    pub fn targets(&self) -> Vec<&Target> {
        let mut all: Vec<_> = self.targets.values().collect();
        all.sort_by_key(|t| t.id);
        all
    }

    /// Number of registered transmitters.
    #[must_use]
    pub fn transmitter_count(&self) -> usize {
        self.transmitters.len()
    }

    /// Number of registered targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

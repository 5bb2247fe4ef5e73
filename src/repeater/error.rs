//! Repeater error types.

use std::net::SocketAddrV4;
use thiserror::Error;

use super::validate::Violation;

/// The kind of entity an id-related error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A listening socket.
    Listener,
    /// An outbound socket.
    Transmitter,
    /// A forwarding destination.
    Target,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listener => write!(f, "listener"),
            Self::Transmitter => write!(f, "transmitter"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Errors that can occur while configuring or running the repeater.
#[derive(Debug, Error)]
pub enum RepeaterError {
    /// An entity was created with id 0.
    #[error("{kind} id must be positive")]
    ZeroId {
        /// The entity kind.
        kind: EntityKind,
    },

    /// An entity was created with an id that is already registered.
    #[error("duplicate {kind} id {id}")]
    DuplicateId {
        /// The entity kind.
        kind: EntityKind,
        /// The offending id.
        id: u32,
    },

    /// A port was outside the allowed range.
    #[error("invalid port {port}: must be between 1024 and 65536 noninclusive")]
    InvalidPort {
        /// The offending port.
        port: u16,
    },

    /// A target was created without a destination address.
    #[error("target {id} must have an address defined")]
    TargetWithoutAddress {
        /// The target id.
        id: u32,
    },

    /// A target was created without a destination port.
    #[error("target {id} must have a port defined")]
    TargetWithoutPort {
        /// The target id.
        id: u32,
    },

    /// A target was created without a transmitter reference.
    #[error("target {id} must have a transmitter defined")]
    TargetWithoutTransmitter {
        /// The target id.
        id: u32,
    },

    /// An operation was attempted in the wrong lifecycle phase.
    #[error("operation requires the {expected} phase (currently {current})")]
    WrongPhase {
        /// The phase the repeater is in.
        current: &'static str,
        /// The phase the operation requires.
        expected: &'static str,
    },

    /// The hard ceiling on open sockets was reached.
    #[error("socket limit of {limit} reached")]
    SocketLimit {
        /// The configured ceiling.
        limit: usize,
    },

    /// Failed to create or configure a UDP socket.
    #[error("failed to open socket: {0}")]
    OpenError(#[source] std::io::Error),

    /// Failed to bind a socket to the requested address.
    #[error("failed to bind to {address}: {source}")]
    BindError {
        /// The address that failed to bind.
        address: SocketAddrV4,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The multiplexed readiness wait failed. Unrecoverable.
    #[error("readiness wait failed: {0}")]
    WaitError(#[source] std::io::Error),

    /// The repeater was started with no sockets registered.
    #[error("no sockets registered; nothing to serve")]
    NoSockets,

    /// Referential-integrity validation failed. All violations are listed.
    #[error("config verification failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for repeater operations.
pub type RepeaterResult<T> = Result<T, RepeaterError>;

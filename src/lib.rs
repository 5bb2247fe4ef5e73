//! # UDP Repeater
//!
//! A UDP packet repeater: receives datagrams on a set of statically
//! configured listening sockets and forwards byte-identical copies to one or
//! more destinations chosen by matching rules on listener identity and
//! packet source address/port.
//!
//! ## Architecture
//!
//! The core lives in the [`repeater`] module: an entity registry of
//! transmitters and targets, an ordered table of map rules, a socket pool
//! with a multiplexed readiness wait, a one-shot referential-integrity
//! validator, and the forwarding loop that ties them together. The
//! [`config`] module loads the on-disk JSON rules file and drives the
//! entity-creation calls.
//!
//! ## Lifecycle
//!
//! A [`repeater::Repeater`] moves through three phases: entities are created
//! while *Configuring*, the registry and rule table are cross-checked while
//! *Validating*, and the forwarding loop owns the process while *Running*.
//! There are no back-transitions; the routing model is immutable once
//! serving begins.

pub mod config;
pub mod repeater;

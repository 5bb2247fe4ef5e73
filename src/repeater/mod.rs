//! # Repeater core
//!
//! The routing and forwarding engine: entities are registered while
//! configuring, cross-checked once, then served by a single loop that waits
//! on every socket at once and fans matching datagrams out to their targets.
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use udp_repeater::repeater::Repeater;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut repeater = Repeater::new();
//! repeater.create_listener(1, Ipv4Addr::UNSPECIFIED, 5000)?;
//! repeater.create_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)?;
//! repeater.create_target(1, Ipv4Addr::new(10, 0, 0, 5), 6000, 1)?;
//! repeater.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1)?;
//! repeater.start().await?; // validates, then serves forever
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod registry;
mod socket;
mod table;
mod validate;

pub use engine::{Phase, Repeater, RepeaterStats};
pub use error::{EntityKind, RepeaterError, RepeaterResult};
pub use registry::{Registry, Target, Transmitter};
pub use socket::{SocketPool, SocketTag, MAX_DATAGRAM_SIZE, MAX_SOCKETS, RECV_BUFFER_SIZE, SEND_BUFFER_SIZE};
pub use table::{Map, RoutingTable};
pub use validate::{verify, Violation};

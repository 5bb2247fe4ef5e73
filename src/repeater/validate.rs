//! One-shot referential-integrity check over the registry and routing table.

use std::fmt;

use super::registry::Registry;
use super::table::RoutingTable;

/// A single referential-integrity violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A map references a target id that is not registered.
    UnknownTarget {
        /// Zero-based position of the map in the table.
        map_index: usize,
        /// The unresolved target id.
        target_id: u32,
    },
    /// A target references a transmitter id that is not registered.
    UnknownTransmitter {
        /// The target holding the dangling reference.
        target_id: u32,
        /// The unresolved transmitter id.
        transmitter_id: u32,
    },
    /// A target is defined but no map references it.
    UnmappedTarget {
        /// The unreferenced target id.
        target_id: u32,
    },
    /// A transmitter is defined but no target references it.
    UnusedTransmitter {
        /// The unreferenced transmitter id.
        transmitter_id: u32,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTarget {
                map_index,
                target_id,
            } => write!(
                f,
                "target {target_id} referenced in map {map_index} but not defined"
            ),
            Self::UnknownTransmitter {
                target_id,
                transmitter_id,
            } => write!(
                f,
                "transmitter {transmitter_id} referenced in target {target_id} but not defined"
            ),
            Self::UnmappedTarget { target_id } => {
                write!(f, "target {target_id} defined but not used in any map")
            }
            Self::UnusedTransmitter { transmitter_id } => write!(
                f,
                "transmitter {transmitter_id} defined but not used in any target"
            ),
        }
    }
}

/// Check the four invariants of a configured routing model, accumulating
/// every violation rather than stopping at the first:
///
/// 1. every map's target resolves,
/// 2. every target's transmitter resolves,
/// 3. every target is referenced by at least one map,
/// 4. every transmitter is referenced by at least one target.
///
/// An empty result means the model is consistent and serving may begin.
#[must_use]
pub fn verify(registry: &Registry, table: &RoutingTable) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (map_index, map) in table.maps().iter().enumerate() {
        if registry.target(map.target_id).is_none() {
            violations.push(Violation::UnknownTarget {
                map_index,
                target_id: map.target_id,
            });
        }
    }

    for target in registry.targets() {
        if registry.transmitter(target.transmitter_id).is_none() {
            violations.push(Violation::UnknownTransmitter {
                target_id: target.id,
                transmitter_id: target.transmitter_id,
            });
        }
        if !table.maps().iter().any(|m| m.target_id == target.id) {
            violations.push(Violation::UnmappedTarget {
                target_id: target.id,
            });
        }
    }

    for transmitter in registry.transmitters() {
        if !registry
            .targets()
            .iter()
            .any(|t| t.transmitter_id == transmitter.id)
        {
            violations.push(Violation::UnusedTransmitter {
                transmitter_id: transmitter.id,
            });
        }
    }

    violations
}

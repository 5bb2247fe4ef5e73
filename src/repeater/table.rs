//! The ordered table of map rules.

use std::net::Ipv4Addr;

/// A routing rule: packets received on `listener_id` from a matching source
/// are forwarded to `target_id`.
///
/// `Ipv4Addr::UNSPECIFIED` as the source-address filter and `0` as the
/// source-port filter act as wildcards. A single inbound packet can match
/// any number of maps; every match fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    /// Id of the listener the packet must arrive on.
    pub listener_id: u32,
    /// Source-address filter (unspecified = wildcard).
    pub src_address: Ipv4Addr,
    /// Source-port filter (0 = wildcard).
    pub src_port: u16,
    /// The target to forward matching packets to.
    pub target_id: u32,
}

impl Map {
    /// Whether a packet received on `listener_id` from `src_address:src_port`
    /// matches this rule.
    #[must_use]
    pub fn matches(&self, listener_id: u32, src_address: Ipv4Addr, src_port: u16) -> bool {
        self.listener_id == listener_id
            && (self.src_address.is_unspecified() || self.src_address == src_address)
            && (self.src_port == 0 || self.src_port == src_port)
    }
}

/// Ordered collection of map rules.
///
/// Matching is a full linear scan by design: rule counts are small and fixed
/// at config time, and the wildcard fields make partial-key indexing more
/// complex than the gain justifies at this scale. Insertion order affects
/// only dump output, never which rules match.
#[derive(Debug, Default)]
pub struct RoutingTable {
    maps: Vec<Map>,
}

impl RoutingTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a map rule.
    pub fn push(&mut self, map: Map) {
        self.maps.push(map);
    }

    /// All maps, in insertion order.
    #[must_use]
    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    /// Number of maps in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Returns `true` if the table holds no maps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Every map matching the given listener and packet source. No
    /// first-match short circuit and no deduplication: two matching maps
    /// referencing the same target yield two results.
    pub fn matching(
        &self,
        listener_id: u32,
        src_address: Ipv4Addr,
        src_port: u16,
    ) -> impl Iterator<Item = &Map> {
        self.maps
            .iter()
            .filter(move |m| m.matches(listener_id, src_address, src_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(listener_id: u32, src_address: Ipv4Addr, src_port: u16, target_id: u32) -> Map {
        Map {
            listener_id,
            src_address,
            src_port,
            target_id,
        }
    }

    const ANY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

    #[test]
    fn test_wildcard_map_matches_any_source() {
        let m = map(1, ANY, 0, 1);
        assert!(m.matches(1, Ipv4Addr::new(10, 0, 0, 1), 7000));
        assert!(m.matches(1, Ipv4Addr::new(192, 168, 1, 1), 1));
        assert!(!m.matches(2, Ipv4Addr::new(10, 0, 0, 1), 7000));
    }

    #[test]
    fn test_address_filter_is_exact() {
        let m = map(1, Ipv4Addr::new(10, 0, 0, 1), 0, 1);
        assert!(m.matches(1, Ipv4Addr::new(10, 0, 0, 1), 9999));
        assert!(!m.matches(1, Ipv4Addr::new(10, 0, 0, 2), 9999));
    }

    #[test]
    fn test_port_filter_is_exact() {
        let m = map(1, ANY, 7000, 1);
        assert!(m.matches(1, Ipv4Addr::new(10, 0, 0, 1), 7000));
        assert!(!m.matches(1, Ipv4Addr::new(10, 0, 0, 1), 7001));
    }

    #[test]
    fn test_all_matches_fire_with_multiplicity() {
        let mut table = RoutingTable::new();
        table.push(map(1, ANY, 0, 1));
        table.push(map(1, ANY, 0, 2));
        table.push(map(1, ANY, 0, 1)); // duplicate target, counted twice
        table.push(map(2, ANY, 0, 3)); // different listener

        let targets: Vec<u32> = table
            .matching(1, Ipv4Addr::new(10, 0, 0, 1), 5000)
            .map(|m| m.target_id)
            .collect();
        assert_eq!(targets, vec![1, 2, 1]);
    }

    #[test]
    fn test_match_set_is_order_independent() {
        let sources = [
            map(1, ANY, 0, 1),
            map(1, Ipv4Addr::new(10, 0, 0, 1), 0, 2),
            map(1, ANY, 7000, 3),
        ];

        let mut forward = RoutingTable::new();
        for m in &sources {
            forward.push(m.clone());
        }
        let mut reverse = RoutingTable::new();
        for m in sources.iter().rev() {
            reverse.push(m.clone());
        }

        let collect = |t: &RoutingTable| {
            let mut ids: Vec<u32> = t
                .matching(1, Ipv4Addr::new(10, 0, 0, 1), 7000)
                .map(|m| m.target_id)
                .collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(collect(&forward), collect(&reverse));
        assert_eq!(collect(&forward), vec![1, 2, 3]);
    }

    #[test]
    fn test_port_filtered_map_skips_other_ports() {
        let mut table = RoutingTable::new();
        table.push(map(1, ANY, 7000, 1));
        table.push(map(1, ANY, 0, 2));

        // Source port 7001: only the wildcard map fires.
        let targets: Vec<u32> = table
            .matching(1, Ipv4Addr::new(10, 0, 0, 1), 7001)
            .map(|m| m.target_id)
            .collect();
        assert_eq!(targets, vec![2]);
    }
}

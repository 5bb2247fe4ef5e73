//! Rules-file schema.
//!
//! The on-disk format is a JSON object with four arrays: `listen`,
//! `transmit`, `target`, and `map`. Addresses are dotted quads (`"*"` for
//! any/wildcard where allowed) and ports are strings, matching the format
//! the repeater has always consumed. Field names are matched exactly;
//! unknown keys are rejected rather than silently ignored.

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// A parsed rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    /// Listener definitions.
    pub listen: Option<Vec<ListenEntry>>,
    /// Transmitter definitions.
    pub transmit: Option<Vec<TransmitEntry>>,
    /// Target definitions.
    pub target: Option<Vec<TargetEntry>>,
    /// Map rules.
    pub map: Option<Vec<MapEntry>>,
}

impl RulesFile {
    /// Check that all four sections are present, reporting every missing
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSections`] naming each absent section.
    pub fn check_sections(&self) -> ConfigResult<()> {
        let mut missing = Vec::new();
        if self.listen.is_none() {
            missing.push("listen");
        }
        if self.transmit.is_none() {
            missing.push("transmit");
        }
        if self.target.is_none() {
            missing.push("target");
        }
        if self.map.is_none() {
            missing.push("map");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSections(missing))
        }
    }
}

/// One entry of the `listen` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenEntry {
    /// Routing id, must be positive.
    pub id: i64,
    /// Bind address, dotted quad or `"*"` for any.
    pub address: String,
    /// Bind port, required.
    pub port: String,
}

/// One entry of the `transmit` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransmitEntry {
    /// Transmitter id, must be positive.
    pub id: i64,
    /// Bind address, dotted quad or `"*"` for any.
    pub address: String,
    /// Bind port, or `"*"` for ephemeral assignment.
    pub port: String,
}

/// One entry of the `target` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEntry {
    /// Target id, must be positive.
    pub id: i64,
    /// Destination address, dotted quad (no wildcard).
    pub address: String,
    /// Destination port, required.
    pub port: String,
    /// Id of the transmitter to send through.
    pub transmitter: i64,
}

/// One entry of the `map` array. The `target` field is a list: one map rule
/// is created per listed target id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapEntry {
    /// Id of the listener the rule applies to.
    pub source: i64,
    /// Source-address filter, dotted quad or `"*"`.
    pub address: String,
    /// Source-port filter, or `"*"`.
    pub port: String,
    /// Target ids matching packets fan out to.
    pub target: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_all_reported() {
        let rules: RulesFile = serde_json::from_str(r#"{"listen": []}"#).unwrap();
        let result = rules.check_sections();
        match result {
            Err(ConfigError::MissingSections(missing)) => {
                assert_eq!(missing, vec!["transmit", "target", "map"]);
            }
            other => panic!("expected missing sections, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let result: Result<RulesFile, _> =
            serde_json::from_str(r#"{"listen": [], "transmit": [], "target": [], "map": [], "listeners": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_entry_key_rejected() {
        // "adress" (a near-miss of "address") must not be accepted.
        let result: Result<RulesFile, _> = serde_json::from_str(
            r#"{"listen": [{"id": 1, "adress": "*", "port": "5000"}],
                "transmit": [], "target": [], "map": []}"#,
        );
        assert!(result.is_err());
    }
}

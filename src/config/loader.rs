//! Loading the rules file and driving the entity-creation calls.

use std::net::Ipv4Addr;
use std::path::Path;

use tracing::info;

use super::error::{ConfigError, ConfigResult};
use super::types::RulesFile;
use crate::repeater::Repeater;

/// Load and parse a rules file.
///
/// # Errors
///
/// Returns an error if the file does not exist, cannot be read, is not
/// valid JSON, or lacks any of the four required sections.
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<RulesFile> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rules = load_str(&content)?;
    info!(path = %path.display(), "rules file loaded");
    Ok(rules)
}

/// Parse a rules file from a JSON string.
///
/// # Errors
///
/// Returns an error on malformed JSON, unknown keys, or missing sections.
pub fn load_str(content: &str) -> ConfigResult<RulesFile> {
    let rules: RulesFile = serde_json::from_str(content)?;
    rules.check_sections()?;
    Ok(rules)
}

/// Apply a parsed rules file to a repeater: one entity-creation call per
/// entry, with a map rule created per target id a map entry lists.
///
/// # Errors
///
/// Returns the first invalid field or rejected creation call; any failure
/// is fatal before serving begins.
pub fn apply(rules: &RulesFile, repeater: &mut Repeater) -> ConfigResult<()> {
    for entry in rules.listen.iter().flatten() {
        let id = parse_id("listen.id", entry.id)?;
        let address = parse_address("listen.address", &entry.address, true)?;
        let port = parse_port("listen.port", &entry.port, false)?;
        repeater.create_listener(id, address, port)?;
    }

    for entry in rules.transmit.iter().flatten() {
        let id = parse_id("transmit.id", entry.id)?;
        let address = parse_address("transmit.address", &entry.address, true)?;
        let port = parse_port("transmit.port", &entry.port, true)?;
        repeater.create_transmitter(id, address, port)?;
    }

    for entry in rules.target.iter().flatten() {
        let id = parse_id("target.id", entry.id)?;
        let address = parse_address("target.address", &entry.address, false)?;
        let port = parse_port("target.port", &entry.port, false)?;
        let transmitter_id = parse_id("target.transmitter", entry.transmitter)?;
        repeater.create_target(id, address, port, transmitter_id)?;
    }

    for entry in rules.map.iter().flatten() {
        let listener_id = parse_id("map.source", entry.source)?;
        let address = parse_address("map.address", &entry.address, true)?;
        let port = parse_port("map.port", &entry.port, true)?;
        for &target in &entry.target {
            let target_id = parse_id("map.target", target)?;
            repeater.create_map(listener_id, address, port, target_id)?;
        }
    }

    Ok(())
}

fn parse_id(field: &'static str, value: i64) -> ConfigResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&id| id > 0)
        .ok_or(ConfigError::NonPositiveId { field, value })
}

fn parse_address(field: &'static str, value: &str, wildcard_ok: bool) -> ConfigResult<Ipv4Addr> {
    if value == "*" && wildcard_ok {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }
    value
        .parse::<Ipv4Addr>()
        .ok()
        .filter(|a| wildcard_ok || !a.is_unspecified())
        .ok_or_else(|| ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

fn parse_port(field: &'static str, value: &str, wildcard_ok: bool) -> ConfigResult<u16> {
    if value == "*" && wildcard_ok {
        return Ok(0);
    }
    value
        .parse::<u32>()
        .ok()
        .filter(|&p| p > 1024 && p < 65536)
        .map(|p| p as u16)
        .ok_or_else(|| ConfigError::InvalidPort {
            field,
            value: value.to_string(),
        })
}

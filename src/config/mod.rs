//! # Rules file
//!
//! Loads the on-disk JSON rules file and turns it into the four
//! entity-creation calls on a [`crate::repeater::Repeater`]. This module is
//! deliberately thin glue around the core: it parses, range-checks, and
//! delegates; the referential-integrity checks across entities run later,
//! when the repeater starts.

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply, load, load_str};
pub use types::{ListenEntry, MapEntry, RulesFile, TargetEntry, TransmitEntry};

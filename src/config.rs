//! Statistics options.
//!
//! The surrounding daemon's configuration layer deserializes this
//! structure from its TOML configuration and hands it to
//! [`Stats::new`](crate::Stats::new) or
//! [`Stats::reinit`](crate::Stats::reinit).

use serde::Deserialize;

/// Global statistics options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StatsOptions {
    /// Gate threshold for registrations: a counter declared at a level
    /// above this is not materialized.
    pub level: u8,

    /// Periodic publish cadence in seconds. Zero disables publishing but
    /// not pruning.
    pub log_freq: u64,

    /// Expiration horizon for dynamic counters, in seconds.
    pub lifetime: u64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            level: 0,
            log_freq: 600,
            lifetime: 600,
        }
    }
}

impl StatsOptions {
    /// Whether a counter declared at `level` materializes under these
    /// options.
    pub fn check_level(&self, level: u8) -> bool {
        self.level >= level
    }
}

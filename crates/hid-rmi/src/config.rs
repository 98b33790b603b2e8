//! Register engine and lifecycle tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Overrides [`RmiConfig::read_timeout_ms`].
pub const READ_TIMEOUT_ENV: &str = "HID_RMI_READ_TIMEOUT_MS";
/// Overrides [`RmiConfig::max_read_attempts`].
pub const MAX_READ_ATTEMPTS_ENV: &str = "HID_RMI_MAX_READ_ATTEMPTS";

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_READ_ATTEMPTS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmiConfig {
    /// Longest wait for the next read-data report before an attempt is
    /// considered lost.
    pub read_timeout_ms: u64,
    /// Read requests issued for one register read before giving up.
    pub max_read_attempts: u8,
    /// Pending mode-recovery requests. Extra requests are coalesced.
    pub recovery_queue_depth: usize,
}

impl Default for RmiConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            recovery_queue_depth: 1,
        }
    }
}

impl RmiConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Defaults with the `HID_RMI_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by environment variable name.
    ///
    /// Values that do not parse, or are zero, are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = parse_positive::<u64>(READ_TIMEOUT_ENV, lookup(READ_TIMEOUT_ENV)) {
            self.read_timeout_ms = ms;
        }
        if let Some(n) = parse_positive::<u8>(MAX_READ_ATTEMPTS_ENV, lookup(MAX_READ_ATTEMPTS_ENV))
        {
            self.max_read_attempts = n;
        }
        self
    }
}

fn parse_positive<T>(key: &str, value: Option<String>) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let value = value?;
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Some(parsed),
        _ => {
            warn!("Ignoring invalid {}={:?}", key, value);
            None
        }
    }
}

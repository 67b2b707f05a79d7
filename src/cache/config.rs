//! Response cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 20;
const DEFAULT_MAX_ENTRIES: usize = 64;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// How long a stored page is served before it is rendered again.
    pub ttl: Duration,
    pub max_entries: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
            max_entries: settings.max_entries,
        }
    }
}

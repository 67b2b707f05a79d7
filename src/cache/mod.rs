//! Process-local cache for rendered index pages.
//!
//! Entries are keyed by path, normalized query and viewer, expire after a fixed
//! TTL and are bounded by an LRU:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! max_entries = 64
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{INDEX_PAGE_PREFIX, ResponseKey, ViewerScope};
pub use middleware::index_cache_layer;
pub use store::{
    CACHE_EVICT_TOTAL, CACHE_EXPIRED_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, CachedResponse,
    ResponseCache,
};

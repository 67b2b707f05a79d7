//! Time-boxed LRU storage for rendered responses.

use std::sync::RwLock;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const CACHE_HIT_TOTAL: &str = "scribbly_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "scribbly_cache_miss_total";
pub const CACHE_EXPIRED_TOTAL: &str = "scribbly_cache_expired_total";
pub const CACHE_EVICT_TOTAL: &str = "scribbly_cache_evict_total";

/// A response captured byte for byte.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// Entries live for `ttl` from the moment they are stored; writes elsewhere never touch them.
pub struct ResponseCache {
    ttl: Duration,
    enabled: bool,
    entries: RwLock<LruCache<ResponseKey, Entry>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            enabled: config.enabled,
            entries: RwLock::new(LruCache::new(config.max_entries)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let fresh = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() < self.ttl,
            None => {
                counter!(CACHE_MISS_TOTAL).increment(1);
                return None;
            }
        };

        if fresh {
            counter!(CACHE_HIT_TOTAL).increment(1);
            entries.get(key).map(|entry| entry.response.clone())
        } else {
            entries.pop(key);
            debug!(key = %key, "cached response expired");
            counter!(CACHE_EXPIRED_TOTAL).increment(1);
            counter!(CACHE_MISS_TOTAL).increment(1);
            None
        }
    }

    pub fn insert(&self, key: ResponseKey, response: CachedResponse) {
        let entry = Entry {
            response,
            stored_at: Instant::now(),
        };
        let displaced = rw_write(&self.entries, SOURCE, "insert").push(key.clone(), entry);
        if let Some((evicted, _)) = displaced
            && evicted != key
        {
            debug!(key = %evicted, "cached response evicted");
            counter!(CACHE_EVICT_TOTAL).increment(1);
        }
    }

    /// Drops every entry; the next request for each page renders afresh.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

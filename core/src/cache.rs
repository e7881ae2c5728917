//! CacheGateway: the boundary contract to an external response store.
//!
//! # Design
//! The store is an injected capability (`CacheStore`), not an overridable
//! hook — `NoopCache` is the default, `MemoryCache` suits tests and simple
//! embedders, and anything persistent lives outside this crate. The engine
//! imposes no transaction semantics on the store; an external store that
//! fails internally should log on its own side and behave like a miss
//! (return `None`, ignore commits) rather than surface errors here.
//!
//! A fingerprint addresses entries: a deterministic composition of endpoint,
//! action, method and *sorted* body fields, so field order at the call site
//! never splits the cache.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::http::{Request, Response};

/// Global default entry lifetime, seconds. Resolution order is per-request
/// override, then the client's current setting, then this.
pub const DEFAULT_EXPIRATION_SECS: u64 = 300;

/// One stored response with its freshness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unix seconds at commit time.
    pub timestamp: u64,
    /// Lifetime in seconds resolved when the entry was committed.
    pub expiration: u64,
    pub response: Response,
}

impl CacheEntry {
    pub fn new(timestamp: u64, expiration: u64, response: Response) -> Self {
        Self {
            timestamp,
            expiration,
            response,
        }
    }

    /// An entry is honored only while `now < timestamp + expiration`.
    pub fn is_fresh(&self, now: u64) -> bool {
        now < self.timestamp + self.expiration
    }
}

/// External response store consumed through the gateway.
pub trait CacheStore {
    fn query(&self, fingerprint: &str) -> Option<CacheEntry>;
    fn commit(&mut self, fingerprint: &str, entry: CacheEntry);
    /// Drop every expired entry.
    fn prune(&mut self);
    fn remove(&mut self, fingerprint: &str);
    fn clear(&mut self);
}

/// Deterministic cache key for a request.
pub fn fingerprint(request: &Request) -> String {
    let mut fields: Vec<_> = request
        .body
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    fields.sort();

    format!(
        "{} {}://{}:{}{}|{}",
        request.method.as_str(),
        request.endpoint.scheme.as_str(),
        request.endpoint.host,
        request.endpoint.port,
        request.action,
        fields.join("&"),
    )
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Store that never holds anything. The default.
pub struct NoopCache;

impl CacheStore for NoopCache {
    fn query(&self, _fingerprint: &str) -> Option<CacheEntry> {
        None
    }
    fn commit(&mut self, _fingerprint: &str, _entry: CacheEntry) {}
    fn prune(&mut self) {}
    fn remove(&mut self, _fingerprint: &str) {}
    fn clear(&mut self) {}
}

/// In-process store backed by a HashMap.
#[derive(Default)]
pub struct MemoryCache {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn query(&self, fingerprint: &str) -> Option<CacheEntry> {
        self.entries.get(fingerprint).cloned()
    }

    fn commit(&mut self, fingerprint: &str, entry: CacheEntry) {
        self.entries.insert(fingerprint.to_string(), entry);
    }

    fn prune(&mut self) {
        let now = unix_now();
        self.entries.retain(|_, entry| entry.is_fresh(now));
    }

    fn remove(&mut self, fingerprint: &str) {
        self.entries.remove(fingerprint);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

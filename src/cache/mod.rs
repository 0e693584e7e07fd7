//! Response cache.
//!
//! # Data Flow
//! ```text
//! GET /lorem
//!     → layer.rs: fingerprint (fingerprint.rs)
//!     → refresh marker?  yes → run handler, overwrite entry
//!     → store.rs hit?    yes → stored response + Expires/Age
//!     → flight lock for the fingerprint (one computation per key)
//!         → re-check store (a leader may have filled it)
//!         → run handler → store if cacheable
//! ```
//!
//! # Design Decisions
//! - One `parking_lot::Mutex` around the LRU; never held across an await
//! - Per-fingerprint async locks live in a `DashMap` and are removed by
//!   the last holder
//! - A failure inside the cache degrades to a miss

pub mod fingerprint;
pub mod layer;
pub mod store;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::config::CacheConfig;
use crate::observability::metrics;

pub use fingerprint::{Fingerprint, VaryPolicy};
pub use layer::cache_middleware;
pub use store::{CachedResponse, LruStore};

/// Invalid cache settings. Fatal at startup.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache capacity must be greater than zero")]
    InvalidCapacity,

    #[error("cache ttl must be greater than zero")]
    InvalidTtl,

    #[error("invalid vary header name: {0:?}")]
    InvalidVaryHeader(String),
}

/// Shared response cache.
pub struct ResponseCache {
    store: Mutex<LruStore>,
    flights: DashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>,
    policy: VaryPolicy,
    ttl: Duration,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or(CacheError::InvalidCapacity)?;
        if config.ttl_secs == 0 {
            return Err(CacheError::InvalidTtl);
        }
        let ttl = Duration::from_secs(config.ttl_secs);
        let policy = VaryPolicy::new(&config.vary_headers, &config.refresh_key)?;

        tracing::debug!(
            capacity = config.capacity,
            ttl_secs = config.ttl_secs,
            vary = ?config.vary_headers,
            "Response cache initialized"
        );

        Ok(Self {
            store: Mutex::new(LruStore::new(capacity, ttl)),
            flights: DashMap::new(),
            policy,
            ttl,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn policy(&self) -> &VaryPolicy {
        &self.policy
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn fingerprint<B>(&self, req: &axum::http::Request<B>) -> Fingerprint {
        self.policy
            .fingerprint(req.method(), req.uri(), req.headers())
    }

    /// Whether the request asks to bypass the read. The fresh result is
    /// still written back.
    pub fn invalidate_on_refresh<B>(&self, req: &axum::http::Request<B>) -> bool {
        self.policy.is_refresh(req.uri())
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Arc<CachedResponse>> {
        self.store.lock().get(key)
    }

    pub fn put(&self, key: Fingerprint, entry: CachedResponse) {
        let (evicted, len) = {
            let mut store = self.store.lock();
            let evicted = store.put(key, entry);
            (evicted, store.len())
        };
        for key in &evicted {
            tracing::trace!(fingerprint = %key, "Evicted cached response");
        }
        metrics::set_cache_entries(len);
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Wait for exclusive right to compute `key`.
    pub async fn flight(&self, key: &Fingerprint) -> FlightGuard<'_> {
        let lock = Arc::clone(
            self.flights
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .value(),
        );

        let (guard, waited) = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => (lock.lock_owned().await, true),
        };

        FlightGuard {
            cache: self,
            key: key.clone(),
            guard: Some(guard),
            waited,
        }
    }

    fn release(&self, key: &Fingerprint) {
        self.flights
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Exclusive right to compute one fingerprint. Released on drop, including
/// when the request future is cancelled.
pub struct FlightGuard<'a> {
    cache: &'a ResponseCache,
    key: Fingerprint,
    guard: Option<OwnedMutexGuard<()>>,
    waited: bool,
}

impl FlightGuard<'_> {
    /// Another request held the flight first.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.cache.release(&self.key);
    }
}

//! Bounded LRU store of complete responses.
//!
//! Recency is a monotonically increasing tick per access. `order` maps tick
//! to key, so the least recently used entry is always `order.first`.
//! Expired entries are not swept; they read as absent and are replaced on
//! the next write or pushed out by capacity.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::cache::fingerprint::Fingerprint;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    created_at: SystemTime,
    stored: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            created_at: SystemTime::now(),
            stored: Instant::now(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored) < ttl
    }

    /// Rebuild the response, marked with `Expires` and `Age`.
    pub fn to_response(&self, ttl: Duration) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();

        let headers = response.headers_mut();
        if let Some(expires) = http_date(self.created_at + ttl) {
            headers.insert(header::EXPIRES, expires);
        }
        let age = self.stored.elapsed().as_secs();
        headers.insert(header::AGE, HeaderValue::from(age));
        response
    }
}

fn http_date(at: SystemTime) -> Option<HeaderValue> {
    let formatted = OffsetDateTime::from(at)
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .ok()?;
    HeaderValue::from_str(&formatted).ok()
}

struct Slot {
    entry: Arc<CachedResponse>,
    tick: u64,
}

/// Least-recently-used map with a TTL on reads.
pub struct LruStore {
    capacity: NonZeroUsize,
    ttl: Duration,
    slots: HashMap<Fingerprint, Slot>,
    order: BTreeMap<u64, Fingerprint>,
    tick: u64,
}

impl LruStore {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            slots: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fresh entry for `key`, marking it most recently used.
    pub fn get(&mut self, key: &Fingerprint) -> Option<Arc<CachedResponse>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&mut self, key: &Fingerprint, now: Instant) -> Option<Arc<CachedResponse>> {
        let next = self.tick + 1;
        let slot = self.slots.get_mut(key)?;
        if !slot.entry.is_fresh(now, self.ttl) {
            return None;
        }

        self.order.remove(&slot.tick);
        slot.tick = next;
        self.order.insert(next, key.clone());
        self.tick = next;
        Some(Arc::clone(&slot.entry))
    }

    /// Insert or replace `key`. Returns the keys evicted to make room.
    pub fn put(&mut self, key: Fingerprint, entry: CachedResponse) -> Vec<Fingerprint> {
        self.tick += 1;
        let tick = self.tick;

        if let Some(old) = self.slots.insert(
            key.clone(),
            Slot {
                entry: Arc::new(entry),
                tick,
            },
        ) {
            self.order.remove(&old.tick);
        }
        self.order.insert(tick, key);

        let mut evicted = Vec::new();
        while self.slots.len() > self.capacity.get() {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.slots.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }
}

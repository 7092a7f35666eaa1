//! # Response cache
//!
//! Every [`Accio`](crate::Accio) instance owns one [`CacheStore`], shared by all of its
//! subscriptions. It maps a resource key (see [`crate::key`]) to a [`CacheItem`].
//!
//! ## Validity
//!
//! A cache item is *valid* if and only if its payload is resolved **and** its expiration time
//! lies in the future. An item without expiration time is never valid. Invalid items are simply
//! treated as misses: the store itself never evicts them, and [`CacheStore::has`] keeps reporting
//! them as present.
//!
//! ## Payload transitions
//!
//! A payload is either [`Payload::Pending`], while a request for the key is outstanding and no
//! valid item existed, or [`Payload::Resolved`]. The transition is one-directional: a pending
//! item is either replaced by a resolved one, or removed when its request fails or is cancelled.
//!
//! ## Bounds
//!
//! The default [`MemoryStore`] has no size bound. The number of entries is bounded by the number
//! of distinct resource keys a client visits, not by data volume. Long-lived processes can opt
//! into a [`BoundedStore`] instead.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

mod bounded;
mod memory;

pub use bounded::BoundedStore;
pub use memory::MemoryStore;

/// The longest time an item stays valid, roughly 100 years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The contents of a [`CacheItem`].
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A request for this key is outstanding.
    Pending,
    /// The decoded JSON body of a successful response.
    Resolved(Arc<Value>),
}

/// An entry in a [`CacheStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheItem {
    pub payload: Payload,
    /// When this item stops being valid. `None` means it never was.
    pub expires_at: Option<Instant>,
}

impl CacheItem {
    /// A placeholder for a request that has not settled yet.
    pub fn pending() -> Self {
        Self {
            payload: Payload::Pending,
            expires_at: None,
        }
    }

    /// A resolved item without expiration time.
    ///
    /// Use [`expires_in`](Self::expires_in) to make it valid.
    pub fn resolved(value: Arc<Value>) -> Self {
        Self {
            payload: Payload::Resolved(value),
            expires_at: None,
        }
    }

    /// Sets the expiration time relative to now.
    ///
    /// TTLs longer than [`MAX_TTL`] are capped.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(Instant::now() + ttl.min(MAX_TTL));
        self
    }

    /// Whether the payload is still being resolved.
    pub fn is_resolving(&self) -> bool {
        matches!(self.payload, Payload::Pending)
    }

    /// Whether the expiration time has passed, or was never set.
    pub fn has_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Instant::now(),
            None => true,
        }
    }

    /// Whether this item can be served instead of a network request.
    pub fn is_valid(&self) -> bool {
        !self.is_resolving() && !self.has_expired()
    }

    /// The resolved payload, regardless of expiry.
    pub fn value(&self) -> Option<&Arc<Value>> {
        match &self.payload {
            Payload::Resolved(value) => Some(value),
            Payload::Pending => None,
        }
    }

    /// The resolved payload, if this item is valid.
    pub fn valid_value(&self) -> Option<&Arc<Value>> {
        self.is_valid().then(|| self.value()).flatten()
    }
}

/// A key-value store for [`CacheItem`]s.
///
/// Lookups never check validity, callers decide what to do with expired or pending items.
pub trait CacheStore: fmt::Debug + Send + Sync + 'static {
    /// Whether an item for `key` exists, regardless of its validity.
    fn has(&self, key: &str) -> bool;

    /// Returns the item for `key`, regardless of its validity.
    fn get(&self, key: &str) -> Option<CacheItem>;

    /// Inserts or overwrites the item for `key`.
    fn set(&self, key: &str, item: CacheItem);

    /// Removes the item for `key`.
    fn remove(&self, key: &str);

    /// Removes all items.
    fn clear(&self);

    /// The number of items in the store.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;

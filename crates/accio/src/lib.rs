//! # Accio
//!
//! A stale-while-revalidate fetch coordinator for the ScoreSaber API.
//!
//! Views subscribe to a resource key through [`Accio::use_fetch`] and get back a
//! [`Subscription`] exposing reactive `data`, `error`, `loading` and `initial_load_complete`
//! cells. Behind that, the coordinator:
//!
//! - answers from a shared, TTL-bounded [`CacheStore`](caching::CacheStore) when it can,
//! - keeps at most one request in flight per subscription and coalesces concurrent loads onto it,
//! - revalidates in the background when the client regains focus, becomes visible or comes back
//!   online (see [`lifecycle`]),
//! - never lets a failure wipe previously loaded data.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod dispose;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod reactive;
pub mod transport;


pub use coordinator::{
    Accio, FetchSettings, Refresh, RefreshOptions, Rejection, Subscription, UseFetchOptions,
};
pub use error::FetchError;

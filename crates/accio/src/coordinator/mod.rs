//! The fetch coordinator.
//!
//! [`Accio::use_fetch`] creates a [`Subscription`] for one resource key. A subscription loads its
//! resource once on creation and again on every accepted [`Subscription::refresh`], either from
//! the shared cache or from the network.
//!
//! # In-flight guard
//!
//! Each subscription has a single in-flight slot. It is checked and set under one lock that is
//! never held across an `.await`, and it is cleared by a drop guard in the settle step, so it is
//! released no matter how the request ends. The request itself runs as a [`Shared`] future driven
//! by a spawned task: awaiting callers may go away without abandoning the request, and concurrent
//! loads join the request that is already running instead of issuing a second one.
//!
//! # Cancellation
//!
//! A request is cancelled when its subscription is torn down, or when the process-wide
//! [`CancelSignal`] is renewed. Cancellation is not an error: it leaves `data` and `error`
//! untouched.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::caching::{BoundedStore, CacheItem, CacheStore, MemoryStore};
use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::dispose::{Disposer, Teardown};
use crate::error::FetchError;
use crate::lifecycle::{self, Debounce, Lifecycle, Revalidate, Trigger};
use crate::reactive::Cell;
use crate::transport::{FetchOptions, Fetcher, HttpFetcher};


/// Tunables shared by all subscriptions of one [`Accio`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchSettings {
    /// How long a successful response is served from the cache, counted from completion.
    pub ttl: Duration,
    /// Minimum interval between lifecycle-triggered revalidations of one subscription.
    pub revalidate_debounce: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            revalidate_debounce: Duration::from_secs(5),
        }
    }
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.cache.ttl,
            revalidate_debounce: config.revalidate.debounce,
        }
    }
}

/// Called with the decoded data after every successful load.
pub type OnSuccess<D> = Arc<dyn Fn(&D) + Send + Sync>;

/// Called with the error after every failed load. Cancellations are not reported.
pub type OnError = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Options for [`Accio::use_fetch`].
pub struct UseFetchOptions<D> {
    pub on_success: Option<OnSuccess<D>>,
    pub on_error: Option<OnError>,
    /// Opts out of lifecycle revalidation. Defaults to `false`.
    pub ignore_subscriptions: bool,
    /// Sends the session credentials along. Defaults to `true`.
    pub with_credentials: bool,
}

impl<D> UseFetchOptions<D> {
    pub fn on_success<F: Fn(&D) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F: Fn(&FetchError) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn ignore_subscriptions(mut self, ignore: bool) -> Self {
        self.ignore_subscriptions = ignore;
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }
}

impl<D> Default for UseFetchOptions<D> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            ignore_subscriptions: false,
            with_credentials: true,
        }
    }
}

impl<D> Clone for UseFetchOptions<D> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            ignore_subscriptions: self.ignore_subscriptions,
            with_credentials: self.with_credentials,
        }
    }
}

impl<D> fmt::Debug for UseFetchOptions<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseFetchOptions")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("ignore_subscriptions", &self.ignore_subscriptions)
            .field("with_credentials", &self.with_credentials)
            .finish()
    }
}

/// Options for [`Subscription::refresh`]. Everything is off by default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Switches the subscription to another resource key.
    pub new_url: Option<String>,
    /// Keeps the current `data` and `error` while loading. Otherwise both are cleared first.
    pub soft_refresh: bool,
    /// Skips the cache, even if it holds a valid item.
    pub force_revalidate: bool,
    /// Does not toggle `loading`.
    pub silent: bool,
    /// Accepts the refresh even though the initial load has not completed yet.
    pub bypass_initial_check: bool,
}

impl RefreshOptions {
    /// The options of a background revalidation: forced, soft and silent.
    pub fn revalidate() -> Self {
        Self {
            force_revalidate: true,
            soft_refresh: true,
            silent: true,
            ..Default::default()
        }
    }
}

/// Why a refresh was not performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("initial load has not completed")]
    InitialLoadPending,
    #[error("a request is already in flight")]
    InFlight,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::InitialLoadPending => "initial_load_pending",
            Rejection::InFlight => "in_flight",
        }
    }
}

/// The outcome of [`Subscription::refresh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// The load ran and its result has been applied.
    Completed,
    /// Nothing happened.
    Rejected(Rejection),
}

impl Refresh {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Refresh::Rejected(_))
    }
}

/// Entry point to the coordinator.
///
/// Cloning is cheap and yields a handle to the same cache, cancellation signal and lifecycle.
#[derive(Clone, Debug)]
pub struct Accio {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancelSignal,
    lifecycle: Lifecycle,
    settings: FetchSettings,
}

impl Accio {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CacheStore>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            cancel: CancelSignal::new(),
            lifecycle: Lifecycle::new(),
            settings,
        }
    }

    /// Creates an instance talking to the configured API over HTTP.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn CacheStore> = match config.cache.capacity {
            Some(capacity) => Arc::new(BoundedStore::new(capacity)),
            None => Arc::new(MemoryStore::new()),
        };
        let fetcher = HttpFetcher::from_config(config).context("failed to create HTTP client")?;
        Ok(Self::new(
            Arc::new(fetcher),
            store,
            FetchSettings::from_config(config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }

    /// Removes all cached responses.
    pub fn clear_cache(&self) {
        tracing::debug!(items = self.store.len(), "Clearing cache");
        self.store.clear();
    }

    /// Subscribes to the resource at `key` and starts loading it.
    ///
    /// A valid cached item is applied before this returns. Otherwise a request is started in the
    /// background, see [`Subscription::settled`] to wait for it.
    ///
    /// Must be called within a tokio runtime.
    pub fn use_fetch<D>(
        &self,
        key: impl Into<String>,
        options: UseFetchOptions<D>,
    ) -> Subscription<D>
    where
        D: DeserializeOwned + Send + Sync + 'static,
    {
        let inner = Arc::new(Inner {
            accio: self.clone(),
            options,
            data: Cell::new(None),
            error: Cell::new(None),
            loading: Cell::new(false),
            initial_load_complete: Cell::new(false),
            state: Mutex::new(State {
                key: key.into(),
                in_flight: None,
            }),
            scope: CancellationToken::new(),
        });

        let mut teardown = Teardown::default();
        let scope = inner.scope.clone();
        teardown.push(Disposer::new(move || scope.cancel()));

        if !inner.options.ignore_subscriptions {
            let debounce = Arc::new(Debounce::new(self.settings.revalidate_debounce));
            for trigger in Trigger::ALL {
                teardown.push(lifecycle::spawn_trigger(
                    &self.lifecycle,
                    trigger,
                    Arc::clone(&debounce),
                    Arc::downgrade(&inner),
                ));
            }
        }

        let begin = inner.begin_load(&mut inner.lock_state(), false, false);
        if let Begin::Cached(value) = begin {
            inner.apply_cached(&value);
        }

        Subscription { inner, teardown }
    }
}

type SharedLoad = Shared<BoxFuture<'static, ()>>;

struct State {
    key: String,
    in_flight: Option<SharedLoad>,
}

enum Begin {
    /// A valid item was found in the cache.
    Cached(Arc<Value>),
    /// A network request is running.
    Load(SharedLoad),
}

struct Inner<D> {
    accio: Accio,
    options: UseFetchOptions<D>,
    data: Cell<Option<Arc<D>>>,
    error: Cell<Option<FetchError>>,
    loading: Cell<bool>,
    initial_load_complete: Cell<bool>,
    state: Mutex<State>,
    /// Cancelled on teardown.
    scope: CancellationToken,
}

impl<D> Inner<D> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D> Inner<D>
where
    D: DeserializeOwned + Send + Sync + 'static,
{
    /// Decides how to load the current key. Must be called with the state locked.
    fn begin_load(self: &Arc<Self>, state: &mut State, force: bool, silent: bool) -> Begin {
        let store = &self.accio.store;

        if !force {
            metric!(counter("accio.cache.access") += 1);
            if let Some(value) = store
                .get(&state.key)
                .and_then(|item| item.valid_value().cloned())
            {
                metric!(counter("accio.cache.hit") += 1);
                tracing::trace!(key = %state.key, "Serving from cache");
                return Begin::Cached(value);
            }
            metric!(counter("accio.cache.miss") += 1);
        }

        if let Some(in_flight) = &state.in_flight {
            metric!(counter("accio.fetch.dedup") += 1);
            return Begin::Load(in_flight.clone());
        }

        // a valid item keeps serving other subscriptions while this one revalidates
        if !store.get(&state.key).is_some_and(|item| item.is_valid()) {
            store.set(&state.key, CacheItem::pending());
        }
        if !silent {
            self.loading.set(true);
        }

        let token = self.accio.cancel.token();
        let load = Arc::clone(self)
            .settle(state.key.clone(), token, silent)
            .boxed()
            .shared();
        state.in_flight = Some(load.clone());
        tokio::spawn(load.clone());

        Begin::Load(load)
    }

    async fn run(&self, begin: Begin) {
        match begin {
            Begin::Cached(value) => self.apply_cached(&value),
            Begin::Load(load) => load.await,
        }
    }

    /// Performs the network request for `key` and applies its outcome. Runs once per request.
    async fn settle(self: Arc<Self>, key: String, token: CancellationToken, silent: bool) {
        let _finish = {
            let inner = Arc::clone(&self);
            Disposer::new(move || inner.finish(silent))
        };
        let _cancel_on_drop = token.clone().drop_guard();

        let fetcher = Arc::clone(&self.accio.fetcher);
        let options = FetchOptions {
            with_credentials: self.options.with_credentials,
            cancel: token.clone(),
        };

        let result = tokio::select! {
            biased;
            _ = self.scope.cancelled() => Err(FetchError::Cancelled),
            // the fetcher gets a chance to observe its token first
            result = fetcher.fetch_json(&key, options) => result,
            _ = token.cancelled() => Err(FetchError::Cancelled),
        };
        let aborted = token.is_cancelled() || self.scope.is_cancelled();
        let result = match result {
            // errors caused by aborting the request are not failures
            Err(err) if !err.is_cancelled() && aborted => {
                tracing::trace!(error = %err, "Discarding error of cancelled request");
                Err(FetchError::Cancelled)
            }
            result => result,
        };

        match result {
            Ok(value) => {
                metric!(counter("accio.fetch") += 1, "status" => "ok");
                let value = Arc::new(value);
                let item =
                    CacheItem::resolved(Arc::clone(&value)).expires_in(self.accio.settings.ttl);
                self.accio.store.set(&key, item);
                self.apply(&value);
            }
            Err(FetchError::Cancelled) => {
                metric!(counter("accio.fetch") += 1, "status" => "cancelled");
                tracing::debug!(%key, "Request cancelled");
                self.release_pending(&key);
            }
            Err(err) => {
                metric!(counter("accio.fetch") += 1, "status" => "error");
                tracing::warn!(
                    %key,
                    error = &err as &dyn std::error::Error,
                    "Failed to fetch resource"
                );
                self.release_pending(&key);
                self.fail(err);
            }
        }
    }

    fn finish(&self, silent: bool) {
        self.lock_state().in_flight = None;
        if !silent {
            self.loading.set(false);
        }
        self.complete_initial_load();
    }

    fn complete_initial_load(&self) {
        if !self.initial_load_complete.get() {
            self.initial_load_complete.set(true);
        }
    }

    fn release_pending(&self, key: &str) {
        let store = &self.accio.store;
        if store.get(key).is_some_and(|item| item.is_resolving()) {
            store.remove(key);
        }
    }

    fn apply_cached(&self, value: &Value) {
        self.apply(value);
        self.complete_initial_load();
    }

    fn apply(&self, value: &Value) {
        match D::deserialize(value) {
            Ok(data) => {
                let data = Arc::new(data);
                self.data.set(Some(Arc::clone(&data)));
                self.error.set(None);
                if let Some(on_success) = &self.options.on_success {
                    on_success(&data);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Response does not match the expected shape");
                self.fail(err.into());
            }
        }
    }

    fn fail(&self, err: FetchError) {
        self.error.set(Some(err.clone()));
        if let Some(on_error) = &self.options.on_error {
            on_error(&err);
        }
    }

    async fn refresh(self: &Arc<Self>, options: RefreshOptions) -> Refresh {
        let begin = {
            let mut state = self.lock_state();
            let rejection = if !options.bypass_initial_check && !self.initial_load_complete.get() {
                Some(Rejection::InitialLoadPending)
            } else if state.in_flight.is_some() {
                Some(Rejection::InFlight)
            } else {
                None
            };
            if let Some(rejection) = rejection {
                tracing::debug!(key = %state.key, reason = %rejection, "Refresh rejected");
                metric!(counter("accio.refresh.rejected") += 1, "reason" => rejection.as_str());
                return Refresh::Rejected(rejection);
            }

            if let Some(new_url) = options.new_url {
                state.key = new_url;
            }
            if !options.soft_refresh {
                self.data.set(None);
                self.error.set(None);
            }
            self.begin_load(&mut state, options.force_revalidate, options.silent)
        };

        self.run(begin).await;
        Refresh::Completed
    }
}

impl<D> Revalidate for Inner<D>
where
    D: DeserializeOwned + Send + Sync + 'static,
{
    fn key(&self) -> String {
        self.lock_state().key.clone()
    }

    fn revalidate(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            self.refresh(RefreshOptions::revalidate()).await;
        }
        .boxed()
    }
}

/// A live subscription to one resource.
///
/// Dropping it cancels the in-flight request and deregisters all lifecycle triggers.
pub struct Subscription<D> {
    inner: Arc<Inner<D>>,
    teardown: Teardown,
}

impl<D> Subscription<D>
where
    D: DeserializeOwned + Send + Sync + 'static,
{
    /// The last successfully loaded data.
    pub fn data(&self) -> &Cell<Option<Arc<D>>> {
        &self.inner.data
    }

    /// The last failure. Cleared by the next success.
    pub fn error(&self) -> &Cell<Option<FetchError>> {
        &self.inner.error
    }

    /// Whether a non-silent request is outstanding.
    pub fn loading(&self) -> &Cell<bool> {
        &self.inner.loading
    }

    /// Set once the first load has settled, and never reset.
    pub fn initial_load_complete(&self) -> &Cell<bool> {
        &self.inner.initial_load_complete
    }

    /// The current resource key.
    pub fn key(&self) -> String {
        self.inner.lock_state().key.clone()
    }

    /// Loads the resource again.
    ///
    /// Returns [`Refresh::Rejected`] without doing anything if the initial load has not
    /// completed (unless bypassed) or a request is in flight.
    pub async fn refresh(&self, options: RefreshOptions) -> Refresh {
        self.inner.refresh(options).await
    }

    /// Waits for the in-flight request, if any, to settle.
    pub async fn settled(&self) {
        let in_flight = self.inner.lock_state().in_flight.clone();
        if let Some(in_flight) = in_flight {
            in_flight.await;
        }
    }

    /// Tears the subscription down. Same as dropping it.
    pub fn unsubscribe(mut self) {
        self.teardown.run();
    }
}

impl<D> fmt::Debug for Subscription<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Subscription")
            .field("key", &state.key)
            .field("in_flight", &state.in_flight.is_some())
            .field("loading", &self.inner.loading.get())
            .finish()
    }
}

//! Background revalidation on lifecycle events.
//!
//! A client publishes what happens to it (gaining focus, becoming visible, coming back online)
//! on a [`Lifecycle`]. Every subscription that did not opt out listens to it and revalidates its
//! resource in the background, at most once per debounce interval. That revalidation is forced,
//! soft and silent: it skips the cache, keeps the current data visible and does not toggle
//! `loading`.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::dispose::Disposer;

/// Number of events a slow listener may lag behind before it starts missing them.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Something that happened to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The client regained focus.
    Focus,
    /// The client was shown or hidden.
    Visibility(Visibility),
    /// Connectivity was restored.
    Online,
    /// Connectivity was lost.
    Offline,
}

/// The events that cause a revalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Focus,
    Visibility,
    Online,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Focus, Trigger::Visibility, Trigger::Online];

    /// Whether `event` fires this trigger.
    pub fn matches(self, event: LifecycleEvent) -> bool {
        matches!(
            (self, event),
            (Trigger::Focus, LifecycleEvent::Focus)
                | (
                    Trigger::Visibility,
                    LifecycleEvent::Visibility(Visibility::Visible)
                )
                | (Trigger::Online, LifecycleEvent::Online)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Focus => "focus",
            Trigger::Visibility => "visibility",
            Trigger::Online => "online",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source of [`LifecycleEvent`]s.
///
/// Cloning yields a handle to the same source.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes `event` to all listeners and returns how many there are.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        tracing::trace!(?event, "Lifecycle event");
        // fails only if nobody listens, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    pub fn focus(&self) -> usize {
        self.emit(LifecycleEvent::Focus)
    }

    pub fn set_visibility(&self, visibility: Visibility) -> usize {
        self.emit(LifecycleEvent::Visibility(visibility))
    }

    pub fn set_online(&self, online: bool) -> usize {
        self.emit(if online {
            LifecycleEvent::Online
        } else {
            LifecycleEvent::Offline
        })
    }

    pub fn listen(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// The number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Enforces a minimum interval between revalidations.
///
/// The first attempt always passes. Afterwards, strictly more than `interval` must have passed
/// since the last successful attempt.
#[derive(Debug)]
pub struct Debounce {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Debounce {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Returns `true` and records the attempt if the interval has passed.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(last) if now.duration_since(last) <= self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Something that can be revalidated by a lifecycle trigger.
pub(crate) trait Revalidate: Send + Sync + 'static {
    /// The resource key, for logging.
    fn key(&self) -> String;

    fn revalidate(self: Arc<Self>) -> BoxFuture<'static, ()>;
}

/// Spawns a task that revalidates `target` whenever `trigger` fires.
///
/// The task only holds a weak reference and ends once `target` is gone. Dropping the returned
/// [`Disposer`] stops it.
pub(crate) fn spawn_trigger<T: Revalidate>(
    lifecycle: &Lifecycle,
    trigger: Trigger,
    debounce: Arc<Debounce>,
    target: Weak<T>,
) -> Disposer {
    // listen before spawning, events emitted right after registration must not be lost
    let mut events = lifecycle.listen();

    let handle = tokio::spawn(async move {
        // revalidations run next to the receive loop, so the debounce sees events when they
        // arrive; aborting this task drops the set and aborts them along with it
        let mut revalidations = JoinSet::new();
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                Some(_) = revalidations.join_next() => continue,
            };
            let event = match event {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!(skipped, "Lifecycle listener lagged behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !trigger.matches(event) || !debounce.try_acquire() {
                continue;
            }
            let Some(target) = target.upgrade() else {
                break;
            };

            tracing::info!(%trigger, key = %target.key(), "Revalidating");
            metric!(counter("accio.lifecycle.revalidate") += 1, "trigger" => trigger.as_str());
            revalidations.spawn(target.revalidate());
        }
    });

    Disposer::abort_task(handle)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Counter {
        fn get(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl Revalidate for Counter {
        fn key(&self) -> String {
            "/api/player/42/full".into()
        }

        fn revalidate(self: Arc<Self>) -> BoxFuture<'static, ()> {
            async move {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
            .boxed()
        }
    }

    async fn tick() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_trigger_matches() {
        assert!(Trigger::Focus.matches(LifecycleEvent::Focus));
        let shown = LifecycleEvent::Visibility(Visibility::Visible);
        let hidden = LifecycleEvent::Visibility(Visibility::Hidden);
        assert!(Trigger::Visibility.matches(shown));
        assert!(!Trigger::Visibility.matches(hidden));
        assert!(Trigger::Online.matches(LifecycleEvent::Online));
        assert!(!Trigger::Online.matches(LifecycleEvent::Offline));
        assert!(!Trigger::Focus.matches(LifecycleEvent::Online));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_is_strict() {
        let debounce = Debounce::new(Duration::from_secs(5));
        assert!(debounce.try_acquire());
        assert!(!debounce.try_acquire());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!debounce.try_acquire());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(debounce.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_share_debounce() {
        let lifecycle = Lifecycle::new();
        let counter = Arc::new(Counter::default());
        let debounce = Arc::new(Debounce::new(Duration::from_secs(5)));

        let _disposers: Vec<_> = Trigger::ALL
            .into_iter()
            .map(|trigger| {
                spawn_trigger(
                    &lifecycle,
                    trigger,
                    Arc::clone(&debounce),
                    Arc::downgrade(&counter),
                )
            })
            .collect();
        assert_eq!(lifecycle.listener_count(), 3);

        lifecycle.focus();
        tick().await;
        lifecycle.set_online(true);
        lifecycle.set_visibility(Visibility::Visible);
        tick().await;
        assert_eq!(counter.get(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        lifecycle.set_visibility(Visibility::Hidden);
        lifecycle.set_online(false);
        tick().await;
        assert_eq!(counter.get(), 1);

        lifecycle.set_online(true);
        tick().await;
        assert_eq!(counter.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_listening() {
        let lifecycle = Lifecycle::new();
        let counter = Arc::new(Counter::default());
        let disposer = spawn_trigger(
            &lifecycle,
            Trigger::Focus,
            Arc::new(Debounce::new(Duration::ZERO)),
            Arc::downgrade(&counter),
        );

        lifecycle.focus();
        tick().await;
        assert_eq!(counter.get(), 1);

        disposer.dispose();
        tick().await;
        assert_eq!(lifecycle.listener_count(), 0);

        lifecycle.focus();
        tick().await;
        assert_eq!(counter.get(), 1);
    }
}

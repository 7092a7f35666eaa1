//! Disposers: guards that release a resource exactly once.
//!
//! Everything a [`Subscription`](crate::Subscription) registers (lifecycle listeners, cell
//! subscribers, the in-flight guard) is owned by a [`Disposer`]. Subscriptions compose them into
//! a [`Teardown`] so a single drop releases all of them.

use std::fmt;

use tokio::task::JoinHandle;

/// Runs a closure once, either on [`dispose`](Self::dispose) or when dropped.
pub struct Disposer(Option<Box<dyn FnOnce() + Send>>);

impl Disposer {
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A disposer that aborts the given task.
    pub fn abort_task<T: Send + 'static>(handle: JoinHandle<T>) -> Self {
        Self::new(move || handle.abort())
    }

    /// Releases the resource now.
    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Disposer")
            .field(&if self.0.is_some() { "armed" } else { "spent" })
            .finish()
    }
}

/// A collection of disposers that are released together, in registration order.
#[derive(Debug, Default)]
pub struct Teardown(Vec<Disposer>);

impl Teardown {
    pub fn push(&mut self, disposer: Disposer) {
        self.0.push(disposer);
    }

    /// Releases all registered resources.
    pub fn run(&mut self) {
        for disposer in self.0.drain(..) {
            disposer.dispose();
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> Disposer {
        let counter = Arc::clone(counter);
        Disposer::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn test_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        counting(&counter).dispose();
        drop(counting(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_teardown_runs_all() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut teardown = Teardown::default();
        teardown.push(counting(&counter));
        teardown.push(counting(&counter));
        teardown.push(counting(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 0);

        drop(teardown);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }
}

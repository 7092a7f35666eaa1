//! Single-writer, multi-reader observable values.

use std::fmt;

use tokio::sync::watch;

use crate::dispose::Disposer;

/// An observable value.
///
/// The owner writes with [`set`](Self::set), everybody else reads the latest value with
/// [`get`](Self::get) or observes changes through [`watch`](Self::watch) or
/// [`subscribe`](Self::subscribe). Every `set` is a change, even if the value is equal to the
/// previous one.
pub struct Cell<T> {
    sender: watch::Sender<T>,
}

impl<T> Cell<T> {
    pub fn new(value: T) -> Self {
        Self {
            sender: watch::Sender::new(value),
        }
    }

    /// Replaces the value and notifies all observers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// A receiver that sees every change made after this call.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Cell<T> {
    /// A clone of the current value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Cell<T> {
    /// Invokes `callback` with every value set after this call.
    ///
    /// The callback runs on a spawned task and is deregistered when the returned [`Disposer`] is
    /// dropped. Observers that lag behind only see the latest value.
    pub fn subscribe<F>(&self, mut callback: F) -> Disposer
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut receiver = self.watch();
        receiver.mark_unchanged();
        let handle = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let value = receiver.borrow_and_update().clone();
                callback(value);
            }
        });
        Disposer::abort_task(handle)
    }
}

impl<T: Default> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cell").field(&*self.sender.borrow()).finish()
    }
}

//! The process-wide cancellation signal.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// A renewable signal that aborts every outstanding request at once.
///
/// Requests bind to the [`token`](Self::token) that is current when they start.
/// [`renew`](Self::renew) cancels that token and installs a fresh one, so requests started
/// afterwards are unaffected. Typical use is logging out or switching accounts.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child of the current token, cancelled when the signal is renewed.
    pub fn token(&self) -> CancellationToken {
        self.current().child_token()
    }

    /// Cancels all requests bound to the current token.
    pub fn renew(&self) {
        let previous = std::mem::replace(&mut *self.current(), CancellationToken::new());
        tracing::debug!("Renewed request cancellation signal");
        previous.cancel();
    }

    fn current(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_cancels_previous_tokens() {
        let signal = CancelSignal::new();
        let stale = signal.token();
        assert!(!stale.is_cancelled());

        signal.renew();
        assert!(stale.is_cancelled());

        let fresh = signal.token();
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn test_cancelling_a_request_token_leaves_the_signal_alone() {
        let signal = CancelSignal::new();
        let first = signal.token();
        let second = signal.token();

        first.cancel();
        assert!(!second.is_cancelled());
    }
}

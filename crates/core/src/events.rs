//! Refresh Notification
//!
//! A single callback slot the mode monitor fires after a visible change.

use parking_lot::Mutex;
use std::sync::Arc;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Holds at most one refresh callback
#[derive(Default)]
pub struct RefreshNotifier {
    callback: Mutex<Option<Callback>>,
}

impl RefreshNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback, replacing any previous one
    pub fn set(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.callback.lock() = Some(Arc::new(callback));
    }

    pub fn clear(&self) {
        *self.callback.lock() = None;
    }

    /// Invoke the callback, if any, after releasing the slot lock.
    ///
    /// Returns whether a callback ran.
    pub fn notify(&self) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for RefreshNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshNotifier")
            .field("set", &self.callback.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_without_callback() {
        let notifier = RefreshNotifier::new();
        assert!(!notifier.notify());
    }

    #[test]
    fn test_notify_calls_latest_callback() {
        let notifier = RefreshNotifier::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        notifier.set(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        notifier.set(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(notifier.notify());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_replace_itself() {
        let notifier = Arc::new(RefreshNotifier::new());
        let inner = Arc::clone(&notifier);
        notifier.set(move || inner.clear());

        assert!(notifier.notify());
        assert!(!notifier.notify());
    }
}

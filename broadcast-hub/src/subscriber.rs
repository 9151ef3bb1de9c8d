use std::{fmt, sync::Arc};

use parking_lot::RwLock;

/// Callback invoked with every accepted line of a hub.
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Single-slot holder for a hub's subscriber.
///
/// Setting a new callback replaces the old one; there is no way to stack
/// callbacks or to clear the slot once set.
#[derive(Default)]
pub struct SubscriberSlot {
    callback: RwLock<Option<Callback>>,
}

impl SubscriberSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `callback`, returning `true` when it replaced a previous one.
    pub fn set<F>(&self, callback: F) -> bool
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callback.write().replace(Arc::new(callback)).is_some()
    }

    pub fn is_set(&self) -> bool {
        self.callback.read().is_some()
    }

    /// Runs the current callback on the caller's task. Returns `false` when no
    /// subscriber is installed.
    pub fn notify(&self, line: &str) -> bool {
        // Clone out of the lock so the callback may itself call `set`.
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => {
                callback(line);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SubscriberSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}

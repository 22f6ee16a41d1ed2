//! Subscription handles.
//!
//! Every subscription is represented by an [`AnyCancellable`]. Cancelling it,
//! or dropping it, detaches the subscriber from the publisher. Cancellation
//! runs the teardown at most once no matter how often it is requested.

use std::fmt;
use std::sync::Mutex;

/// Something that can be cancelled.
pub trait Cancellable {
    /// Requests cancellation. Must be idempotent.
    fn cancel(&self);
}

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Type-erased subscription handle that cancels itself on drop.
pub struct AnyCancellable {
    teardown: Mutex<Option<Teardown>>,
}

impl AnyCancellable {
    /// Creates a handle that runs `teardown` on the first cancel or on drop.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Creates a handle with nothing to tear down.
    ///
    /// Used by publishers that completed the subscription synchronously.
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    /// Returns true once the teardown has run (or if there never was one).
    pub fn is_cancelled(&self) -> bool {
        match self.teardown.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    fn take_teardown(&self) -> Option<Teardown> {
        match self.teardown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Cancellable for AnyCancellable {
    fn cancel(&self) {
        // Run outside the lock: teardown may re-enter the publisher.
        if let Some(teardown) = self.take_teardown() {
            teardown();
        }
    }
}

impl Drop for AnyCancellable {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for AnyCancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCancellable")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

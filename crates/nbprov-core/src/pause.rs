//! Re-entrancy token
//!
//! While provenance replays a function, the document emits the same change
//! notifications a user edit would. Those must not be recorded as new
//! actions. [`PauseFlag`] is the shared token that marks such windows;
//! [`PauseGuard`] releases it when dropped, on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-document pause flag
///
/// Holds a count of live guards so nested holders (a traversal holding the
/// flag while each replayed function acquires it again) keep the flag set
/// until the outermost guard is dropped.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag {
    holders: Arc<AtomicUsize>,
}

impl PauseFlag {
    /// Create a released flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the flag for the lifetime of the returned guard
    #[must_use = "the flag is released as soon as the guard is dropped"]
    pub fn hold(&self) -> PauseGuard {
        self.holders.fetch_add(1, Ordering::SeqCst);
        PauseGuard {
            holders: Arc::clone(&self.holders),
        }
    }

    /// True while at least one guard is alive
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.holders.load(Ordering::SeqCst) > 0
    }

    /// Run `f` with the flag held
    pub fn paused<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.hold();
        f()
    }
}

/// Scoped acquisition of a [`PauseFlag`]
#[derive(Debug)]
pub struct PauseGuard {
    holders: Arc<AtomicUsize>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

//! Call-depth counters that collapse nested native calls into one event.
//!
//! Hooks bracket each intercepted call with [`CallCoalescer::enter`] and
//! [`CallCoalescer::exit`]. Only the `exit` that brings a resource's
//! counter to zero (or below) reports completion, so an outer call that
//! spans several inner calls on the same resource produces exactly one
//! logical event.
//!
//! The lock only covers the counter update. Callers act on the result of
//! `exit` after it returns, so the completion action may re-enter the
//! coalescer.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

/// Per-resource call-depth counters.
#[derive(Debug)]
pub struct CallCoalescer<K> {
    depths: Mutex<HashMap<K, i32>>,
}

impl<K: Eq + Hash> CallCoalescer<K> {
    /// Create a coalescer with no calls in flight.
    pub fn new() -> Self {
        Self {
            depths: Mutex::new(HashMap::new()),
        }
    }

    /// Record that a call on `key` started.
    pub fn enter(&self, key: K) {
        let mut depths = self.depths.lock();
        let depth = depths.entry(key).or_insert(0);
        *depth = depth.saturating_add(1);
    }

    /// Record that a call on `key` finished.
    ///
    /// Returns `true` iff this was the outermost call, in which case the
    /// counter is dropped and the caller owns the completion action.
    /// An `exit` without a matching `enter` returns `false`.
    pub fn exit(&self, key: &K) -> bool {
        let mut depths = self.depths.lock();
        let Some(depth) = depths.get_mut(key) else {
            return false;
        };
        *depth = depth.saturating_sub(1);
        if *depth <= 0 {
            depths.remove(key);
            return true;
        }
        false
    }

    /// Current depth of `key` (zero when no call is in flight).
    pub fn depth(&self, key: &K) -> i32 {
        self.depths.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of resources with calls in flight.
    pub fn active(&self) -> usize {
        self.depths.lock().len()
    }
}

impl<K: Eq + Hash> Default for CallCoalescer<K> {
    fn default() -> Self {
        Self::new()
    }
}

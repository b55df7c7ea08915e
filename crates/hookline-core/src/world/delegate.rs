//! Multicast delegates.
//!
//! Some world objects announce state changes through a delegate rather than
//! an interceptable call. Bindings are `Arc`ed so a broadcast can snapshot
//! them and release the lock before invoking anything; a callback may bind
//! or unbind during a broadcast without deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Handle returned by [`Delegate::bind`], used to unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateHandle(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of callbacks invoked with every broadcast value.
pub struct Delegate<T> {
    bindings: Mutex<Vec<(DelegateHandle, Callback<T>)>>,
    next_handle: AtomicU64,
}

impl<T> Delegate<T> {
    /// A delegate with no bindings.
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Bind `callback`; it runs on every later broadcast.
    pub fn bind(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> DelegateHandle {
        let handle = DelegateHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.bindings.lock().push((handle, Arc::new(callback)));
        handle
    }

    /// Remove a binding. Unknown handles are ignored.
    pub fn unbind(&self, handle: DelegateHandle) {
        self.bindings.lock().retain(|(h, _)| *h != handle);
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    /// Invoke every binding with `value`.
    pub fn broadcast(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = {
            let bindings = self.bindings.lock();
            bindings.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(value);
        }
    }
}

impl<T> Default for Delegate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Delegate<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delegate").field("bindings", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn bind_broadcast_unbind() {
        let delegate = Delegate::<bool>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let handle = delegate.bind(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        delegate.broadcast(&true);
        delegate.unbind(handle);
        delegate.broadcast(&false);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(delegate.is_empty());
    }

    #[test]
    fn callback_may_unbind_itself_during_broadcast() {
        let delegate = Arc::new(Delegate::<u8>::new());
        let slot = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&delegate);
        let own = Arc::clone(&slot);
        let handle = delegate.bind(move |_| {
            if let Some(handle) = *own.lock() {
                inner.unbind(handle);
            }
        });
        *slot.lock() = Some(handle);

        delegate.broadcast(&1);
        assert_eq!(delegate.len(), 0);
    }
}

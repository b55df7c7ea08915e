//! Listener side of signal delivery.
//!
//! A [`SignalListener`] is whatever consumes signals on the scripting side.
//! Emitting objects never point at listeners directly: they hold [`Trace`]s,
//! which pair a weak listener handle with the path the listener was reached
//! through. A trace never keeps its listener alive; once the listener is
//! dropped, deliveries through its traces are silently skipped.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use hookline_types::{ListenerId, ObjectId, Signal, TraceRecord};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::DeliveryError;

/// Consumer of signals for one listener.
pub trait SignalListener: Send + Sync {
    /// Identity of this listener.
    fn listener_id(&self) -> ListenerId;

    /// Accept one signal that arrived through `trace`.
    fn deliver(&self, trace: &Trace, signal: &Signal) -> Result<(), DeliveryError>;
}

/// Handle identifying a listener plus the path it subscribed through.
///
/// Equality and hashing only look at `(listener id, path)`.
#[derive(Clone)]
pub struct Trace {
    listener_id: ListenerId,
    path: Arc<[ObjectId]>,
    listener: Weak<dyn SignalListener>,
}

impl Trace {
    /// Build a trace to `listener` along `path`.
    ///
    /// The path should start at the emitting object the trace will be
    /// registered on.
    pub fn new<L: SignalListener + 'static>(listener: &Arc<L>, path: Vec<ObjectId>) -> Self {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn SignalListener> = weak;
        Self {
            listener_id: listener.listener_id(),
            path: path.into(),
            listener: weak,
        }
    }

    /// Build a trace from an already type-erased listener handle.
    pub fn from_dyn(listener: &Arc<dyn SignalListener>, path: Vec<ObjectId>) -> Self {
        Self {
            listener_id: listener.listener_id(),
            path: path.into(),
            listener: Arc::downgrade(listener),
        }
    }

    /// Rebuild a trace from its persisted record.
    pub fn from_record(record: &TraceRecord, listener: &Arc<dyn SignalListener>) -> Self {
        Self {
            listener_id: record.listener,
            path: record.path.clone().into(),
            listener: Arc::downgrade(listener),
        }
    }

    /// Identity of the listener at the end of the trace.
    pub const fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Hops from the sender to the listener.
    pub fn path(&self) -> &[ObjectId] {
        &self.path
    }

    /// First hop of the path.
    pub fn origin(&self) -> Option<ObjectId> {
        self.path.first().copied()
    }

    /// The listener, if it is still alive.
    pub fn listener(&self) -> Option<Arc<dyn SignalListener>> {
        self.listener.upgrade()
    }

    /// Whether the listener is still alive.
    pub fn is_alive(&self) -> bool {
        self.listener.strong_count() > 0
    }

    /// Persistable form of this trace.
    pub fn to_record(&self) -> TraceRecord {
        TraceRecord {
            listener: self.listener_id,
            path: self.path.to_vec(),
        }
    }
}

impl PartialEq for Trace {
    fn eq(&self, other: &Self) -> bool {
        self.listener_id == other.listener_id && self.path == other.path
    }
}

impl Eq for Trace {}

impl Hash for Trace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.listener_id.hash(state);
        self.path.hash(state);
    }
}

impl core::fmt::Debug for Trace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trace")
            .field("listener_id", &self.listener_id)
            .field("path", &self.path)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Signal queue
// ---------------------------------------------------------------------------

/// A signal waiting in a [`SignalQueue`].
#[derive(Debug, Clone)]
pub struct QueuedSignal {
    /// The object the signal was emitted for (first hop of the trace).
    pub sender: Option<ObjectId>,
    /// The trace the signal arrived through.
    pub trace: TraceRecord,
    /// The signal itself.
    pub signal: Signal,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueuedSignal>,
    closed: bool,
}

/// Bounded inbox listener used by the scripting domain.
///
/// Signals past the capacity are refused with
/// [`DeliveryError::QueueFull`]; the emitter logs and moves on.
#[derive(Debug)]
pub struct SignalQueue {
    id: ListenerId,
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SignalQueue {
    /// Create a queue with a fresh listener id.
    pub fn new(capacity: usize) -> Self {
        Self::with_id(ListenerId::new(), capacity)
    }

    /// Create a queue with a known listener id (used when reloading).
    pub fn with_id(id: ListenerId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Maximum number of pending signals.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending signals.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    /// Take the oldest pending signal.
    pub fn pop(&self) -> Option<QueuedSignal> {
        self.state.lock().pending.pop_front()
    }

    /// Take every pending signal.
    pub fn drain(&self) -> Vec<QueuedSignal> {
        self.state.lock().pending.drain(..).collect()
    }

    /// Refuse further signals and wake any waiting receiver.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Wait for the next signal.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn recv(&self) -> Option<QueuedSignal> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(next) = state.pending.pop_front() {
                    return Some(next);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }
}

impl SignalListener for SignalQueue {
    fn listener_id(&self) -> ListenerId {
        self.id
    }

    fn deliver(&self, trace: &Trace, signal: &Signal) -> Result<(), DeliveryError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(DeliveryError::Closed { listener: self.id });
            }
            if state.pending.len() >= self.capacity {
                return Err(DeliveryError::QueueFull {
                    listener: self.id,
                    capacity: self.capacity,
                });
            }
            state.pending.push_back(QueuedSignal {
                sender: trace.origin(),
                trace: trace.to_record(),
                signal: signal.clone(),
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use hookline_types::names;

    use super::*;

    #[test]
    fn traces_compare_by_listener_and_path() {
        let queue = Arc::new(SignalQueue::new(4));
        let sender = ObjectId::new();
        let hop = ObjectId::new();

        let direct = Trace::new(&queue, vec![sender]);
        let again = Trace::new(&queue, vec![sender]);
        let routed = Trace::new(&queue, vec![sender, hop]);

        assert_eq!(direct, again);
        assert_ne!(direct, routed);

        let set: HashSet<_> = [direct, again, routed].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn trace_does_not_keep_listener_alive() {
        let queue = Arc::new(SignalQueue::new(4));
        let trace = Trace::new(&queue, vec![ObjectId::new()]);
        assert!(trace.is_alive());

        drop(queue);
        assert!(!trace.is_alive());
        assert!(trace.listener().is_none());
    }

    #[test]
    fn record_roundtrip_keeps_identity() {
        let queue = Arc::new(SignalQueue::new(4));
        let trace = Trace::new(&queue, vec![ObjectId::new(), ObjectId::new()]);
        let listener: Arc<dyn SignalListener> = queue;
        let rebuilt = Trace::from_record(&trace.to_record(), &listener);
        assert_eq!(rebuilt, trace);
    }

    #[test]
    fn queue_refuses_past_capacity() {
        let queue = Arc::new(SignalQueue::new(1));
        let trace = Trace::new(&queue, vec![ObjectId::new()]);
        let signal = Signal::named(names::POWER_FUSE_CHANGED);

        assert!(queue.deliver(&trace, &signal).is_ok());
        assert!(matches!(
            queue.deliver(&trace, &signal),
            Err(DeliveryError::QueueFull { capacity: 1, .. })
        ));
        assert_eq!(queue.len(), 1);

        let popped = queue.pop().unwrap();
        assert_eq!(popped.sender, trace.origin());
        assert!(queue.is_empty());
    }

    #[test]
    fn closed_queue_refuses() {
        let queue = Arc::new(SignalQueue::new(4));
        let trace = Trace::new(&queue, vec![ObjectId::new()]);
        queue.close();
        assert!(matches!(
            queue.deliver(&trace, &Signal::named("x")),
            Err(DeliveryError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn recv_wakes_on_delivery() {
        let queue = Arc::new(SignalQueue::new(4));
        let trace = Trace::new(&queue, vec![ObjectId::new()]);

        let receiver = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::task::yield_now().await;

        queue.deliver(&trace, &Signal::named(names::ITEM_TRANSFER)).unwrap();
        let received = receiver.await.unwrap().unwrap();
        assert_eq!(received.signal.name(), names::ITEM_TRANSFER);
    }

    #[tokio::test]
    async fn recv_ends_when_closed() {
        let queue = Arc::new(SignalQueue::new(4));
        queue.close();
        assert!(queue.recv().await.is_none());
    }
}

//! The hook subsystem: listener registry and signal emission.
//!
//! One [`HookSubsystem`] exists per world session. It maps each emitting
//! object to the traces listening to it and the hooks attached to it.
//! Hooks follow the listeners: the first trace on an object attaches every
//! hook kind its capabilities call for, and losing the last trace detaches
//! them all.
//!
//! Emission snapshots the trace list and releases the lock before
//! delivering, so listeners may add or remove listeners (or trigger more
//! emissions) from inside `deliver`. A failing or panicking listener is
//! logged and skipped; the rest still receive the signal. Traces whose
//! listener has been dropped are pruned once the fan-out is finished.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hookline_types::{HookKind, HookRecord, ListenerId, ObjectId, Signal};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::coalescer::CallCoalescer;
use crate::hooks::{ActiveSenders, Hook, build_hook};
use crate::installer::HookInstaller;
use crate::registry::HookRegistry;
use crate::sink::Trace;
use crate::world::{Emitter, NativeSeams};

/// Listeners and attached hooks of one object.
#[derive(Default)]
struct HookData {
    listeners: Vec<Trace>,
    hooks: Vec<Box<dyn Hook>>,
}

impl HookData {
    fn detach(&mut self, subsystem: &HookSubsystem) {
        for mut hook in self.hooks.drain(..) {
            hook.unregister(subsystem);
        }
    }
}

/// Per-session owner of hooks, listeners, and the shared interception
/// state.
pub struct HookSubsystem {
    registry: Arc<HookRegistry>,
    seams: Arc<NativeSeams>,
    installer: HookInstaller,
    coalescer: CallCoalescer<ObjectId>,
    senders: ActiveSenders,
    data: Mutex<HashMap<ObjectId, HookData>>,
}

impl HookSubsystem {
    /// Create the subsystem for a session.
    ///
    /// Hooks install their interceptions into `seams`, which must be the
    /// seams the world's objects call through.
    pub fn new(registry: Arc<HookRegistry>, seams: Arc<NativeSeams>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            seams,
            installer: HookInstaller::new(),
            coalescer: CallCoalescer::new(),
            senders: ActiveSenders::new(),
            data: Mutex::new(HashMap::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Listener registry
    // -----------------------------------------------------------------------

    /// Add `trace` as a listener of `sender`.
    ///
    /// Adding a trace that is already present does nothing. The first
    /// trace attaches every hook kind that applies to the sender. Returns
    /// whether the trace was added.
    pub fn add_listener(self: &Arc<Self>, sender: &Arc<dyn Emitter>, trace: Trace) -> bool {
        let id = sender.id();
        let mut data = self.data.lock();
        let record = data.entry(id).or_default();
        if record.listeners.contains(&trace) {
            return false;
        }

        debug!(object = %id, listener = %trace.listener_id(), hops = trace.path().len(), "Listener added");
        record.listeners.push(trace);
        if record.hooks.is_empty() {
            for kind in self.registry.kinds_for(sender.capabilities()) {
                let mut hook = build_hook(kind);
                hook.register(sender, self);
                record.hooks.push(hook);
                debug!(object = %id, hook = %kind, "Hook attached");
            }
        }
        true
    }

    /// Remove every trace of `listener` from `sender`.
    ///
    /// When no traces remain the object's hooks are detached and its
    /// record is dropped. Returns how many traces were removed.
    pub fn remove_listener(&self, sender: ObjectId, listener: ListenerId) -> usize {
        let mut data = self.data.lock();
        let Some(record) = data.get_mut(&sender) else {
            return 0;
        };
        let before = record.listeners.len();
        record.listeners.retain(|trace| trace.listener_id() != listener);
        let removed = before.saturating_sub(record.listeners.len());
        if removed > 0 {
            debug!(object = %sender, %listener, removed, "Listener removed");
        }

        if record.listeners.is_empty()
            && let Some(mut record) = data.remove(&sender)
        {
            record.detach(self);
            debug!(object = %sender, "Hooks detached");
        }
        removed
    }

    /// Snapshot of the traces listening to `sender`.
    pub fn listeners(&self, sender: ObjectId) -> Vec<Trace> {
        self.data
            .lock()
            .get(&sender)
            .map(|record| record.listeners.clone())
            .unwrap_or_default()
    }

    /// Hook kinds currently attached to `sender`.
    pub fn hooked_kinds(&self, sender: ObjectId) -> Vec<HookKind> {
        self.data
            .lock()
            .get(&sender)
            .map(|record| record.hooks.iter().map(|hook| hook.kind()).collect())
            .unwrap_or_default()
    }

    /// Objects that currently have listeners, sorted.
    pub fn tracked_objects(&self) -> Vec<ObjectId> {
        let mut objects: Vec<ObjectId> = self.data.lock().keys().copied().collect();
        objects.sort_unstable();
        objects
    }

    /// Drop every listener, detach every hook, and take this subsystem's
    /// handlers back out of the seams.
    ///
    /// Hooks attached afterwards install their handlers again.
    pub fn clear(&self) {
        {
            let mut data = self.data.lock();
            let count = data.len();
            for (_, mut record) in data.drain() {
                record.detach(self);
            }
            debug!(objects = count, "Hook data cleared");
        }
        self.uninstall_handlers();
    }

    fn uninstall_handlers(&self) {
        for (operation, handle) in self.installer.drain_installed() {
            if self.seams.uninstall(operation, handle) {
                debug!(%operation, "Native operation released");
            } else {
                warn!(%operation, "Interception handler was already gone");
            }
        }
    }

    /// Whether `sender` has at least one listener.
    pub fn has_listeners(&self, sender: ObjectId) -> bool {
        self.data
            .lock()
            .get(&sender)
            .is_some_and(|record| !record.listeners.is_empty())
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Deliver `signal` to every current listener of `sender`.
    ///
    /// Never fails. Objects without listeners return immediately.
    pub fn emit(&self, sender: ObjectId, signal: Signal) {
        let traces = {
            let data = self.data.lock();
            match data.get(&sender) {
                Some(record) if !record.listeners.is_empty() => record.listeners.clone(),
                _ => return,
            }
        };

        debug!(object = %sender, %signal, listeners = traces.len(), "Emitting signal");
        let mut saw_dead = false;
        for trace in &traces {
            let Some(listener) = trace.listener() else {
                saw_dead = true;
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| listener.deliver(trace, &signal))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(object = %sender, listener = %trace.listener_id(), signal = signal.name(), error = %e, "Signal delivery failed");
                }
                Err(_) => {
                    warn!(object = %sender, listener = %trace.listener_id(), signal = signal.name(), "Listener panicked during delivery");
                }
            }
        }

        if saw_dead {
            self.prune_dead(sender);
        }
    }

    fn prune_dead(&self, sender: ObjectId) {
        let mut data = self.data.lock();
        let Some(record) = data.get_mut(&sender) else {
            return;
        };
        record.listeners.retain(Trace::is_alive);
        if record.listeners.is_empty()
            && let Some(mut record) = data.remove(&sender)
        {
            record.detach(self);
            debug!(object = %sender, "Last listener gone, hooks detached");
        }
    }

    // -----------------------------------------------------------------------
    // Persistence support
    // -----------------------------------------------------------------------

    pub(crate) fn records(&self) -> Vec<HookRecord> {
        let data = self.data.lock();
        let mut records: Vec<HookRecord> = data
            .iter()
            .filter(|(_, record)| !record.listeners.is_empty())
            .map(|(object, record)| {
                let mut listeners: Vec<_> = record.listeners.iter().map(Trace::to_record).collect();
                listeners.sort();
                let mut hooks: Vec<HookKind> = record.hooks.iter().map(|hook| hook.kind()).collect();
                hooks.sort_unstable();
                HookRecord {
                    object: *object,
                    listeners,
                    hooks,
                }
            })
            .collect();
        records.sort_by_key(|record| record.object);
        records
    }

    pub(crate) fn restore_record(
        self: &Arc<Self>,
        sender: &Arc<dyn Emitter>,
        traces: Vec<Trace>,
        kinds: &[HookKind],
    ) {
        let mut hooks = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let mut hook = build_hook(*kind);
            hook.register(sender, self);
            hooks.push(hook);
        }
        let record = HookData {
            listeners: traces,
            hooks,
        };
        if let Some(mut replaced) = self.data.lock().insert(sender.id(), record) {
            replaced.detach(self);
        }
    }

    // -----------------------------------------------------------------------
    // Shared state
    // -----------------------------------------------------------------------

    /// Capability to hook-kind table.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Seams hooks install into.
    pub fn seams(&self) -> &NativeSeams {
        &self.seams
    }

    /// One-shot interception installer.
    pub const fn installer(&self) -> &HookInstaller {
        &self.installer
    }

    /// Call-depth counters keyed by object.
    pub const fn coalescer(&self) -> &CallCoalescer<ObjectId> {
        &self.coalescer
    }

    /// Objects with a registered hook, per kind.
    pub const fn active_senders(&self) -> &ActiveSenders {
        &self.senders
    }
}

impl Drop for HookSubsystem {
    fn drop(&mut self) {
        self.clear();
    }
}

impl core::fmt::Debug for HookSubsystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookSubsystem")
            .field("objects", &self.data.lock().len())
            .field("installed", &self.installer.installed_operations())
            .finish_non_exhaustive()
    }
}

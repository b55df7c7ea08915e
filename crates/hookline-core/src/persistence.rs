//! Saving and restoring hook data across a world reload.
//!
//! A [`HookSnapshot`] records, per object, the listener traces as plain
//! `(listener id, path)` pairs and the kinds of hooks that were attached.
//! Restoring resolves each listener id through a [`ListenerResolver`];
//! traces whose listener no longer exists are dropped, and so are objects
//! left with no traces or missing from the world. Surviving hooks are
//! registered again, which reinstalls interceptions as needed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};

use chrono::Utc;
use hookline_types::{HookSnapshot, ListenerId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::sink::{SignalListener, Trace};
use crate::subsystem::HookSubsystem;
use crate::world::World;

/// Looks up live listeners by id when restoring traces.
pub trait ListenerResolver {
    /// The live listener with `id`, if there is one.
    fn resolve(&self, id: ListenerId) -> Option<Arc<dyn SignalListener>>;
}

/// Weak directory of the listeners that exist in a session.
#[derive(Default)]
pub struct ListenerDirectory {
    listeners: Mutex<HashMap<ListenerId, Weak<dyn SignalListener>>>,
}

impl ListenerDirectory {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `listener` resolvable by its id.
    pub fn register<L: SignalListener + 'static>(&self, listener: &Arc<L>) {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn SignalListener> = weak;
        self.listeners.lock().insert(listener.listener_id(), weak);
    }

    /// Forget `id`.
    pub fn unregister(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }

    /// Number of listeners still alive.
    pub fn live(&self) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl ListenerResolver for ListenerDirectory {
    fn resolve(&self, id: ListenerId) -> Option<Arc<dyn SignalListener>> {
        self.listeners.lock().get(&id).and_then(Weak::upgrade)
    }
}

impl core::fmt::Debug for ListenerDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerDirectory")
            .field("entries", &self.listeners.lock().len())
            .finish()
    }
}

/// What a restore kept and what it dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Objects whose hook data came back.
    pub objects_restored: usize,
    /// Objects dropped (missing from the world or left without traces).
    pub objects_dropped: usize,
    /// Traces that came back.
    pub traces_restored: usize,
    /// Traces dropped because their listener or object is gone.
    pub traces_dropped: usize,
}

impl HookSubsystem {
    /// Capture every object's traces and hook kinds.
    pub fn save(&self) -> HookSnapshot {
        let snapshot = HookSnapshot {
            saved_at: Utc::now(),
            records: self.records(),
        };
        debug!(objects = snapshot.records.len(), "Hook data saved");
        snapshot
    }

    /// Replace the current hook data with `snapshot`.
    ///
    /// Existing listeners are cleared first. Objects are looked up in
    /// `world` and listeners through `resolver`.
    pub fn restore(
        self: &Arc<Self>,
        snapshot: &HookSnapshot,
        world: &World,
        resolver: &dyn ListenerResolver,
    ) -> RestoreReport {
        self.clear();
        let mut report = RestoreReport::default();

        for record in &snapshot.records {
            let Some(sender) = world.emitter(record.object) else {
                debug!(object = %record.object, "Saved object no longer exists");
                report.objects_dropped = report.objects_dropped.saturating_add(1);
                report.traces_dropped = report.traces_dropped.saturating_add(record.listeners.len());
                continue;
            };

            let traces: Vec<Trace> = record
                .listeners
                .iter()
                .filter_map(|saved| {
                    resolver
                        .resolve(saved.listener)
                        .map(|listener| Trace::from_record(saved, &listener))
                })
                .collect();
            report.traces_dropped = report
                .traces_dropped
                .saturating_add(record.listeners.len().saturating_sub(traces.len()));

            if traces.is_empty() {
                debug!(object = %record.object, "No saved listener resolved");
                report.objects_dropped = report.objects_dropped.saturating_add(1);
                continue;
            }

            report.traces_restored = report.traces_restored.saturating_add(traces.len());
            report.objects_restored = report.objects_restored.saturating_add(1);
            self.restore_record(&sender, traces, &record.hooks);
        }

        info!(
            saved_at = %snapshot.saved_at,
            objects_restored = report.objects_restored,
            objects_dropped = report.objects_dropped,
            traces_restored = report.traces_restored,
            traces_dropped = report.traces_dropped,
            "Hook data restored"
        );
        report
    }
}

/// Encode a snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`PersistenceError::Json`] if encoding fails.
pub fn to_json(snapshot: &HookSnapshot) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Decode a snapshot from JSON.
///
/// # Errors
///
/// Returns [`PersistenceError::Json`] if the text is not a valid snapshot.
pub fn from_json(json: &str) -> Result<HookSnapshot, PersistenceError> {
    Ok(serde_json::from_str(json)?)
}

/// Write a snapshot to `path` as JSON.
///
/// # Errors
///
/// Returns [`PersistenceError`] if encoding or writing fails.
pub fn write_snapshot(path: &Path, snapshot: &HookSnapshot) -> Result<(), PersistenceError> {
    std::fs::write(path, to_json(snapshot)?)?;
    Ok(())
}

/// Read a snapshot written by [`write_snapshot`].
///
/// # Errors
///
/// Returns [`PersistenceError`] if reading or decoding fails.
pub fn read_snapshot(path: &Path) -> Result<HookSnapshot, PersistenceError> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}

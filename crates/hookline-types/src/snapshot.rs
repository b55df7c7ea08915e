//! Persisted form of the hook subsystem.
//!
//! Only plain data is stored: per emitting object, the traces that listen
//! to it (as listener id plus path) and the *kinds* of hooks that were
//! attached. Live hook instances and listener handles are rebuilt on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::HookKind;
use crate::ids::{ListenerId, ObjectId};

/// A trace without its live listener handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceRecord {
    /// The listener at the end of the trace.
    pub listener: ListenerId,
    /// The hops from the sender to the listener.
    pub path: Vec<ObjectId>,
}

/// Saved hook data of one emitting object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRecord {
    /// The emitting object.
    pub object: ObjectId,
    /// Its listener traces, sorted.
    pub listeners: Vec<TraceRecord>,
    /// Kinds of the hooks attached to it, sorted.
    pub hooks: Vec<HookKind>,
}

/// Everything the hook subsystem persists across a save/load boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSnapshot {
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// One record per object with at least one listener, sorted by object.
    pub records: Vec<HookRecord>,
}

impl HookSnapshot {
    /// An empty snapshot stamped with the current time.
    pub fn empty() -> Self {
        Self {
            saved_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Look up the record for `object`.
    pub fn record(&self, object: ObjectId) -> Option<&HookRecord> {
        self.records.iter().find(|r| r.object == object)
    }
}

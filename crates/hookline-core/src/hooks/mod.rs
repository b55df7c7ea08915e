//! Hook instances.
//!
//! A hook binds one emitting object to one [`HookKind`]. Registering it
//! makes sure the operation it watches is intercepted (once per operation,
//! through the [`HookInstaller`](crate::installer::HookInstaller)) and
//! marks the object as an active sender for that kind. The shared seam
//! handler consults the active-sender index on every call and ignores
//! objects nobody listens to.
//!
//! # Modules
//!
//! - [`item_transfer`] -- Multi-call hook around the nested grab operations
//! - [`power_fuse`] -- State-change hook diffing the fuse around a tick
//! - [`self_driving`] -- Delegate hook on a train's self-driving flag

pub mod item_transfer;
pub mod power_fuse;
pub mod self_driving;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hookline_types::{HookKind, ObjectId};
use parking_lot::Mutex;

pub use item_transfer::ItemTransferHook;
pub use power_fuse::PowerFuseHook;
pub use self_driving::SelfDrivingHook;

use crate::subsystem::HookSubsystem;
use crate::world::Emitter;

/// One hook bound to one emitting object.
///
/// Registering twice, or unregistering without registering, is a caller
/// error and is not guarded against.
pub trait Hook: Send {
    /// The kind of hook.
    fn kind(&self) -> HookKind;

    /// Start watching `sender`.
    fn register(&mut self, sender: &Arc<dyn Emitter>, subsystem: &Arc<HookSubsystem>);

    /// Stop watching the registered sender.
    fn unregister(&mut self, subsystem: &HookSubsystem);
}

/// Build an unregistered hook of `kind`.
pub fn build_hook(kind: HookKind) -> Box<dyn Hook> {
    match kind {
        HookKind::SelfDriving => Box::new(SelfDrivingHook::new()),
        HookKind::ItemTransfer => Box::new(ItemTransferHook::new()),
        HookKind::PowerFuse => Box::new(PowerFuseHook::new()),
    }
}

/// Objects with a registered hook, per hook kind.
#[derive(Debug, Default)]
pub struct ActiveSenders {
    senders: Mutex<HashMap<HookKind, HashSet<ObjectId>>>,
}

impl ActiveSenders {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `sender` active for `kind`.
    pub fn add(&self, kind: HookKind, sender: ObjectId) {
        self.senders.lock().entry(kind).or_default().insert(sender);
    }

    /// Unmark `sender` for `kind`.
    pub fn remove(&self, kind: HookKind, sender: ObjectId) {
        let mut senders = self.senders.lock();
        if let Some(set) = senders.get_mut(&kind) {
            set.remove(&sender);
            if set.is_empty() {
                senders.remove(&kind);
            }
        }
    }

    /// Whether `sender` is active for `kind`.
    pub fn contains(&self, kind: HookKind, sender: ObjectId) -> bool {
        self.senders
            .lock()
            .get(&kind)
            .is_some_and(|set| set.contains(&sender))
    }

    /// Number of active senders for `kind`.
    pub fn count(&self, kind: HookKind) -> usize {
        self.senders.lock().get(&kind).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_hook_matches_kind() {
        for kind in HookKind::ALL {
            assert_eq!(build_hook(kind).kind(), kind);
        }
    }

    #[test]
    fn active_senders_track_per_kind() {
        let senders = ActiveSenders::new();
        let a = ObjectId::new();
        let b = ObjectId::new();

        senders.add(HookKind::PowerFuse, a);
        senders.add(HookKind::PowerFuse, b);
        senders.add(HookKind::ItemTransfer, a);
        assert!(senders.contains(HookKind::PowerFuse, b));
        assert_eq!(senders.count(HookKind::PowerFuse), 2);

        senders.remove(HookKind::PowerFuse, b);
        assert!(!senders.contains(HookKind::PowerFuse, b));
        assert!(senders.contains(HookKind::ItemTransfer, a));
        assert!(!senders.contains(HookKind::SelfDriving, a));

        senders.remove(HookKind::SelfDriving, a);
        assert_eq!(senders.count(HookKind::SelfDriving), 0);
    }
}

//! `SelfDrivingUpdate`: forwarded from a train's self-driving delegate.
//!
//! Unlike the other hooks this one needs no native interception. It binds
//! a callback on the train itself and removes it again on unregister.

use std::sync::{Arc, Weak};

use hookline_types::{HookKind, ObjectId, Signal, SignalValue, names};
use tracing::warn;

use super::Hook;
use crate::subsystem::HookSubsystem;
use crate::world::{DelegateHandle, Emitter};

struct Binding {
    sender: ObjectId,
    train: Weak<dyn Emitter>,
    handle: Option<DelegateHandle>,
}

/// Delegate hook on a train.
#[derive(Default)]
pub struct SelfDrivingHook {
    binding: Option<Binding>,
}

impl SelfDrivingHook {
    /// An unregistered hook.
    pub const fn new() -> Self {
        Self { binding: None }
    }
}

impl core::fmt::Debug for SelfDrivingHook {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SelfDrivingHook")
            .field("sender", &self.binding.as_ref().map(|b| b.sender))
            .finish()
    }
}

impl Hook for SelfDrivingHook {
    fn kind(&self) -> HookKind {
        HookKind::SelfDriving
    }

    fn register(&mut self, sender: &Arc<dyn Emitter>, subsystem: &Arc<HookSubsystem>) {
        let id = sender.id();
        let handle = sender.as_train().map(|train| {
            let weak = Arc::downgrade(subsystem);
            train.self_driving_changed().bind(move |enabled: &bool| {
                let Some(subsystem) = weak.upgrade() else {
                    return;
                };
                if subsystem.active_senders().contains(HookKind::SelfDriving, id) {
                    subsystem.emit(
                        id,
                        Signal::new(names::SELF_DRIVING_UPDATE, vec![SignalValue::from(*enabled)]),
                    );
                }
            })
        });
        if handle.is_none() {
            warn!(object = %id, "Self-driving hook registered on an object that is not a train");
        }

        subsystem.active_senders().add(HookKind::SelfDriving, id);
        self.binding = Some(Binding {
            sender: id,
            train: Arc::downgrade(sender),
            handle,
        });
    }

    fn unregister(&mut self, subsystem: &HookSubsystem) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        subsystem
            .active_senders()
            .remove(HookKind::SelfDriving, binding.sender);
        if let (Some(emitter), Some(handle)) = (binding.train.upgrade(), binding.handle)
            && let Some(train) = emitter.as_train()
        {
            train.self_driving_changed().unbind(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HookRegistry;
    use crate::world::{NativeSeams, SoundLibrary, World};

    #[test]
    fn register_binds_and_unregister_unbinds() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), seams);
        let train = world.spawn_train("Express");
        let sender: Arc<dyn Emitter> = Arc::clone(&train) as Arc<dyn Emitter>;

        let mut hook = SelfDrivingHook::new();
        hook.register(&sender, &subsystem);
        assert_eq!(train.self_driving_changed().len(), 1);
        assert!(subsystem.active_senders().contains(HookKind::SelfDriving, train.id()));

        hook.unregister(&subsystem);
        assert!(train.self_driving_changed().is_empty());
        assert!(!subsystem.active_senders().contains(HookKind::SelfDriving, train.id()));
        assert!(subsystem.installer().installed_operations().is_empty());
    }
}

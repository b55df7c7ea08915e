//! `PowerFuseChanged`: emitted when a circuit tick flips the fuse.

use std::sync::{Arc, Weak};

use hookline_types::{HookKind, ObjectId, Signal, names};

use super::Hook;
use crate::seam::{NativeCall, SeamHandler};
use crate::subsystem::HookSubsystem;
use crate::world::{Emitter, TickCircuit};

/// State-change hook on a power circuit.
#[derive(Debug, Default)]
pub struct PowerFuseHook {
    sender: Option<ObjectId>,
}

impl PowerFuseHook {
    /// An unregistered hook.
    pub const fn new() -> Self {
        Self { sender: None }
    }
}

impl Hook for PowerFuseHook {
    fn kind(&self) -> HookKind {
        HookKind::PowerFuse
    }

    fn register(&mut self, sender: &Arc<dyn Emitter>, subsystem: &Arc<HookSubsystem>) {
        subsystem
            .installer()
            .install_once(&subsystem.seams().tick_circuit, || {
                tick_handler(Arc::downgrade(subsystem))
            });

        let id = sender.id();
        subsystem.active_senders().add(HookKind::PowerFuse, id);
        self.sender = Some(id);
    }

    fn unregister(&mut self, subsystem: &HookSubsystem) {
        if let Some(id) = self.sender.take() {
            subsystem.active_senders().remove(HookKind::PowerFuse, id);
        }
    }
}

fn tick_handler(subsystem: Weak<HookSubsystem>) -> SeamHandler<TickCircuit, ()> {
    Arc::new(move |call: &mut NativeCall<'_, TickCircuit, ()>| {
        let Some(subsystem) = subsystem.upgrade() else {
            return;
        };
        let circuit = Arc::clone(&call.args().circuit);
        let id = circuit.id();
        if !subsystem.active_senders().contains(HookKind::PowerFuse, id) {
            return;
        }

        let before = circuit.is_fuse_triggered();
        call.proceed();
        if circuit.is_fuse_triggered() != before {
            subsystem.emit(id, Signal::named(names::POWER_FUSE_CHANGED));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HookRegistry;
    use crate::sink::{SignalQueue, Trace};
    use crate::world::{NativeSeams, SoundLibrary, World};

    #[test]
    fn emits_on_trip_and_reset_only() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams));
        let circuit = world.spawn_circuit("Main Grid", 100.0);
        let queue = Arc::new(SignalQueue::new(8));

        let sender: Arc<dyn Emitter> = Arc::clone(&circuit) as Arc<dyn Emitter>;
        subsystem.add_listener(&sender, Trace::new(&queue, vec![circuit.id()]));

        circuit.set_load(50.0);
        circuit.tick_circuit(1.0);
        assert!(queue.is_empty());

        circuit.set_load(150.0);
        circuit.tick_circuit(1.0);
        circuit.tick_circuit(1.0);
        assert_eq!(queue.len(), 1);

        circuit.set_load(10.0);
        circuit.reset_fuse();
        circuit.tick_circuit(1.0);
        assert_eq!(queue.len(), 2);

        assert!(
            queue
                .drain()
                .iter()
                .all(|queued| queued.signal.name() == names::POWER_FUSE_CHANGED)
        );
    }

    #[test]
    fn unregistered_circuit_is_ignored() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams));
        let watched: Arc<dyn Emitter> = world.spawn_circuit("Watched", 10.0);
        let other = world.spawn_circuit("Other", 10.0);

        let mut hook = PowerFuseHook::new();
        hook.register(&watched, &subsystem);

        other.set_load(20.0);
        other.tick_circuit(1.0);
        assert!(other.is_fuse_triggered());
        assert_eq!(subsystem.active_senders().count(HookKind::PowerFuse), 1);
        assert!(!subsystem.active_senders().contains(HookKind::PowerFuse, other.id()));
    }
}

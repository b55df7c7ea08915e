//! `ItemTransfer`: one signal per item that leaves a factory connector.
//!
//! A single pull runs `grab_output`, which calls `grab_output_inventory`
//! once or twice. Both operations are intercepted with the same handler,
//! bracketed by the call coalescer keyed on the connector. Only the
//! outermost call completes, and it emits if the grab succeeded.

use std::sync::{Arc, Weak};

use hookline_types::{HookKind, ObjectId, Signal, SignalValue, names};

use super::Hook;
use crate::seam::{NativeCall, SeamHandler};
use crate::subsystem::HookSubsystem;
use crate::world::{Emitter, GrabCall};

/// Multi-call hook on a factory connector.
#[derive(Debug, Default)]
pub struct ItemTransferHook {
    sender: Option<ObjectId>,
}

impl ItemTransferHook {
    /// An unregistered hook.
    pub const fn new() -> Self {
        Self { sender: None }
    }
}

impl Hook for ItemTransferHook {
    fn kind(&self) -> HookKind {
        HookKind::ItemTransfer
    }

    fn register(&mut self, sender: &Arc<dyn Emitter>, subsystem: &Arc<HookSubsystem>) {
        let seams = subsystem.seams();
        let installer = subsystem.installer();
        installer.install_once(&seams.grab_output, || grab_handler(Arc::downgrade(subsystem)));
        installer.install_once(&seams.grab_output_inventory, || {
            grab_handler(Arc::downgrade(subsystem))
        });

        let id = sender.id();
        subsystem.active_senders().add(HookKind::ItemTransfer, id);
        self.sender = Some(id);
    }

    fn unregister(&mut self, subsystem: &HookSubsystem) {
        if let Some(id) = self.sender.take() {
            subsystem.active_senders().remove(HookKind::ItemTransfer, id);
        }
    }
}

fn grab_handler<A: GrabCall + 'static>(subsystem: Weak<HookSubsystem>) -> SeamHandler<A, bool> {
    Arc::new(move |call: &mut NativeCall<'_, A, bool>| {
        let Some(subsystem) = subsystem.upgrade() else {
            return;
        };
        let connector = call.args().connector();
        if !subsystem
            .active_senders()
            .contains(HookKind::ItemTransfer, connector)
        {
            return;
        }

        let coalescer = subsystem.coalescer();
        coalescer.enter(connector);
        let grabbed = *call.proceed();
        if !coalescer.exit(&connector) || !grabbed {
            return;
        }

        if let Some(item) = call.args().item().cloned() {
            subsystem.emit(
                connector,
                Signal::new(names::ITEM_TRANSFER, vec![SignalValue::from(item)]),
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use hookline_types::{ItemStack, NativeOperation};

    use super::*;
    use crate::registry::HookRegistry;
    use crate::sink::{SignalQueue, Trace};
    use crate::world::{NativeSeams, SoundLibrary, World};

    #[test]
    fn register_installs_both_grab_operations_once() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams));
        let first: Arc<dyn Emitter> = world.spawn_connector("A");
        let second: Arc<dyn Emitter> = world.spawn_connector("B");

        let mut a = ItemTransferHook::new();
        let mut b = ItemTransferHook::new();
        a.register(&first, &subsystem);
        b.register(&second, &subsystem);

        assert_eq!(seams.grab_output.handler_count(), 1);
        assert_eq!(seams.grab_output_inventory.handler_count(), 1);
        assert!(subsystem.installer().is_installed(NativeOperation::FactoryGrabOutput));
        assert_eq!(subsystem.active_senders().count(HookKind::ItemTransfer), 2);

        a.unregister(&subsystem);
        assert!(!subsystem.active_senders().contains(HookKind::ItemTransfer, first.id()));
        assert_eq!(seams.grab_output.handler_count(), 1);
    }

    #[test]
    fn unwatched_connector_emits_nothing() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams));
        let watched = world.spawn_connector("Watched");
        let quiet = world.spawn_connector("Quiet");
        let queue = Arc::new(SignalQueue::new(8));

        let sender: Arc<dyn Emitter> = Arc::clone(&watched) as Arc<dyn Emitter>;
        subsystem.add_listener(&sender, Trace::new(&queue, vec![watched.id()]));

        quiet.stock(ItemStack::new("screw", 10));
        assert!(quiet.grab_output(None).is_some());
        assert!(queue.is_empty());
        assert_eq!(subsystem.coalescer().active(), 0);
    }

    #[test]
    fn failed_grab_emits_nothing() {
        let seams = Arc::new(NativeSeams::new());
        let world = World::new(Arc::clone(&seams), SoundLibrary::new());
        let subsystem = HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams));
        let connector = world.spawn_connector("Empty");
        let queue = Arc::new(SignalQueue::new(8));

        let sender: Arc<dyn Emitter> = Arc::clone(&connector) as Arc<dyn Emitter>;
        subsystem.add_listener(&sender, Trace::new(&queue, vec![connector.id()]));

        assert!(connector.grab_output(None).is_none());
        assert!(queue.is_empty());
        assert_eq!(subsystem.coalescer().depth(&connector.id()), 0);
    }
}

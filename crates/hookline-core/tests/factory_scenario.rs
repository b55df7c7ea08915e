//! End-to-end hook behaviour on a live world.
//!
//! These tests drive native operations through the world's seams and check
//! what listeners receive, without reaching into subsystem internals.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc,
    clippy::panic
)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use hookline_core::registry::HookRegistry;
use hookline_core::seam::NativeCall;
use hookline_core::sink::{SignalListener, SignalQueue, Trace};
use hookline_core::subsystem::HookSubsystem;
use hookline_core::world::{Emitter, GrabOutputInventory, NativeSeams, SoundLibrary, World};
use hookline_types::{HookKind, ItemStack, NativeOperation, SignalValue, names};
use parking_lot::Mutex;

struct Rig {
    seams: Arc<NativeSeams>,
    world: World,
    subsystem: Arc<HookSubsystem>,
}

fn rig_with(seams: NativeSeams) -> Rig {
    let seams = Arc::new(seams);
    Rig {
        world: World::new(Arc::clone(&seams), SoundLibrary::new()),
        subsystem: HookSubsystem::new(Arc::new(HookRegistry::builtin()), Arc::clone(&seams)),
        seams,
    }
}

fn rig() -> Rig {
    rig_with(NativeSeams::new())
}

// =============================================================================
// Nested grab coalescing
// =============================================================================

#[test]
fn nested_grab_emits_one_item_transfer() {
    let rig = rig();
    let connector = rig.world.spawn_connector("Constructor Output");
    let sender: Arc<dyn Emitter> = Arc::clone(&connector) as Arc<dyn Emitter>;
    let trace_a = Arc::new(SignalQueue::new(8));
    rig.subsystem
        .add_listener(&sender, Trace::new(&trace_a, vec![connector.id()]));
    assert_eq!(rig.subsystem.hooked_kinds(connector.id()), vec![HookKind::ItemTransfer]);

    // Runs after the hook's handler has closed each inner call, while the
    // outer grab is still open.
    let depths = Arc::new(Mutex::new(Vec::new()));
    let seen_depths = Arc::clone(&depths);
    let observer_subsystem = Arc::clone(&rig.subsystem);
    rig.seams
        .grab_output_inventory
        .install(Arc::new(move |call: &mut NativeCall<'_, GrabOutputInventory, bool>| {
            let depth = observer_subsystem.coalescer().depth(&call.args().connector);
            seen_depths.lock().push(depth);
        }))
        .unwrap();

    // Empty inventory: the first inner grab fails, the input side refills,
    // the second inner grab succeeds. enter/enter/exit/enter/exit/exit.
    connector.push_input(ItemStack::new("iron_rod", 1));
    let grabbed = connector.grab_output(None);
    assert_eq!(grabbed, Some(ItemStack::new("iron_rod", 1)));

    assert_eq!(*depths.lock(), vec![1, 1]);
    assert_eq!(rig.subsystem.coalescer().depth(&connector.id()), 0);

    let received = trace_a.drain();
    assert_eq!(received.len(), 1);
    let signal = &received[0].signal;
    assert_eq!(signal.name(), names::ITEM_TRANSFER);
    assert_eq!(
        signal.args(),
        &[SignalValue::Item(ItemStack::new("iron_rod", 1))]
    );
    assert_eq!(received[0].sender, Some(connector.id()));

    assert_eq!(rig.subsystem.remove_listener(connector.id(), trace_a.listener_id()), 1);
    assert!(rig.subsystem.listeners(connector.id()).is_empty());
    assert!(rig.subsystem.hooked_kinds(connector.id()).is_empty());

    connector.stock(ItemStack::new("iron_rod", 1));
    assert!(connector.grab_output(None).is_some());
    assert!(trace_a.is_empty());
}

#[test]
fn direct_inventory_grab_is_its_own_event() {
    let rig = rig();
    let connector = rig.world.spawn_connector("Splitter");
    let sender: Arc<dyn Emitter> = Arc::clone(&connector) as Arc<dyn Emitter>;
    let queue = Arc::new(SignalQueue::new(8));
    rig.subsystem
        .add_listener(&sender, Trace::new(&queue, vec![connector.id()]));

    connector.stock(ItemStack::new("wire", 5));
    connector.stock(ItemStack::new("cable", 1));
    assert!(connector.grab_output_inventory(None).is_some());
    assert!(connector.grab_output(None).is_some());
    assert_eq!(queue.len(), 2);
}

#[test]
fn installs_once_for_every_connector() {
    let rig = rig();
    let queue = Arc::new(SignalQueue::new(64));
    let connectors: Vec<_> = (0..4)
        .map(|i| rig.world.spawn_connector(&format!("Belt {i}")))
        .collect();
    for connector in &connectors {
        let sender: Arc<dyn Emitter> = Arc::clone(connector) as Arc<dyn Emitter>;
        rig.subsystem
            .add_listener(&sender, Trace::new(&queue, vec![connector.id()]));
    }

    assert_eq!(rig.seams.grab_output.handler_count(), 1);
    assert_eq!(rig.seams.grab_output_inventory.handler_count(), 1);
    assert_eq!(
        rig.subsystem.installer().installed_operations(),
        vec![
            NativeOperation::FactoryGrabOutput,
            NativeOperation::FactoryGrabOutputInventory
        ]
    );
}

#[test]
fn concurrent_grabs_emit_once_per_item() {
    let rig = rig();
    let queue = Arc::new(SignalQueue::new(1024));
    let connectors: Vec<_> = (0..4)
        .map(|i| rig.world.spawn_connector(&format!("Line {i}")))
        .collect();
    for connector in &connectors {
        let sender: Arc<dyn Emitter> = Arc::clone(connector) as Arc<dyn Emitter>;
        rig.subsystem
            .add_listener(&sender, Trace::new(&queue, vec![connector.id()]));
        for _ in 0..25 {
            connector.push_input(ItemStack::new("plate", 1));
        }
    }

    let workers: Vec<_> = connectors
        .iter()
        .map(|connector| {
            let connector = Arc::clone(connector);
            thread::spawn(move || {
                let mut grabbed = 0_u32;
                while connector.grab_output(None).is_some() {
                    grabbed += 1;
                }
                grabbed
            })
        })
        .collect();
    let grabbed: u32 = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(grabbed, 100);
    assert_eq!(queue.len(), 100);
    assert_eq!(rig.subsystem.coalescer().active(), 0);
}

#[test]
fn overlapping_grabs_on_one_connector_never_duplicate() {
    const ITEMS: usize = 200;
    const THREADS: usize = 6;

    let rig = rig();
    let queue = Arc::new(SignalQueue::new(1024));
    let connector = rig.world.spawn_connector("Shared Output");
    let sender: Arc<dyn Emitter> = Arc::clone(&connector) as Arc<dyn Emitter>;
    rig.subsystem
        .add_listener(&sender, Trace::new(&queue, vec![connector.id()]));
    for i in 0..ITEMS {
        connector.stock(ItemStack::new(format!("plate_{i}"), 1));
    }

    let start = Arc::new(std::sync::Barrier::new(THREADS));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let connector = Arc::clone(&connector);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut grabbed = Vec::new();
                while let Some(stack) = connector.grab_output(None) {
                    grabbed.push(stack.item);
                }
                grabbed
            })
        })
        .collect();
    let grabbed: Vec<String> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    let grabbed_set: HashSet<&String> = grabbed.iter().collect();
    assert_eq!(grabbed.len(), ITEMS);
    assert_eq!(grabbed_set.len(), ITEMS);

    // Overlapping grabs may collapse into one signal, but a signal is
    // never repeated and always names an item that really left.
    let signalled: Vec<String> = queue
        .drain()
        .into_iter()
        .map(|q| match q.signal.args() {
            [SignalValue::Item(stack)] => stack.item.clone(),
            other => panic!("unexpected ItemTransfer args {other:?}"),
        })
        .collect();
    let signalled_set: HashSet<&String> = signalled.iter().collect();
    assert!(!signalled.is_empty());
    assert!(signalled.len() <= ITEMS);
    assert_eq!(signalled_set.len(), signalled.len());
    assert!(signalled_set.is_subset(&grabbed_set));
    assert_eq!(rig.subsystem.coalescer().active(), 0);
}

// =============================================================================
// Installation failure
// =============================================================================

#[test]
fn unpatchable_operation_never_fires_but_others_do() {
    let rig = rig_with(NativeSeams::with_unpatchable(&[
        NativeOperation::FactoryGrabOutput,
        NativeOperation::FactoryGrabOutputInventory,
    ]));
    let connector = rig.world.spawn_connector("Locked");
    let circuit = rig.world.spawn_circuit("Grid", 10.0);
    let queue = Arc::new(SignalQueue::new(8));

    for sender in [
        Arc::clone(&connector) as Arc<dyn Emitter>,
        Arc::clone(&circuit) as Arc<dyn Emitter>,
    ] {
        let path = vec![sender.id()];
        rig.subsystem.add_listener(&sender, Trace::new(&queue, path));
    }

    connector.stock(ItemStack::new("ore", 1));
    assert!(connector.grab_output(None).is_some());
    assert!(queue.is_empty());

    circuit.set_load(50.0);
    circuit.tick_circuit(1.0);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop().unwrap().signal.name(), names::POWER_FUSE_CHANGED);

    assert!(!rig.subsystem.installer().is_installed(NativeOperation::FactoryGrabOutput));
    assert!(rig.subsystem.installer().is_installed(NativeOperation::PowerTickCircuit));
}

// =============================================================================
// Mixed capabilities
// =============================================================================

#[test]
fn every_object_kind_reaches_its_listener() {
    let rig = rig();
    let train = rig.world.spawn_train("Express");
    let circuit = rig.world.spawn_circuit("Grid", 10.0);
    let connector = rig.world.spawn_connector("Belt");
    let queue = Arc::new(SignalQueue::new(16));

    for sender in [
        Arc::clone(&train) as Arc<dyn Emitter>,
        Arc::clone(&circuit) as Arc<dyn Emitter>,
        Arc::clone(&connector) as Arc<dyn Emitter>,
    ] {
        let path = vec![sender.id()];
        rig.subsystem.add_listener(&sender, Trace::new(&queue, path));
    }

    train.set_self_driving(true);
    circuit.set_load(11.0);
    circuit.tick_circuit(0.5);
    connector.stock(ItemStack::new("beam", 2));
    connector.grab_output(None);

    let seen: Vec<(String, _)> = queue
        .drain()
        .into_iter()
        .map(|queued| (queued.signal.name().to_owned(), queued.sender))
        .collect();
    assert_eq!(
        seen,
        vec![
            (names::SELF_DRIVING_UPDATE.to_owned(), Some(train.id())),
            (names::POWER_FUSE_CHANGED.to_owned(), Some(circuit.id())),
            (names::ITEM_TRANSFER.to_owned(), Some(connector.id())),
        ]
    );
}

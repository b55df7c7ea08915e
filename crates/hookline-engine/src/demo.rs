//! The demo factory and the tick callback that keeps it busy.

use std::sync::Arc;

use hookline_core::session::{Session, TickCallback, TickReport};
use hookline_core::sink::{SignalQueue, Trace};
use hookline_core::world::{
    Emitter, FactoryConnector, PowerCircuit, SoundLibrary, SpeakerPole, Train, World,
};
use hookline_types::{ItemStack, ObjectId};
use tracing::{debug, info};

/// Sound played when a fuse blows.
pub const ALARM_SOUND: &str = "alarm";

/// Items cycled through the demo connectors.
const ITEMS: [&str; 4] = ["iron_plate", "iron_rod", "screw", "wire"];

/// Ticks between overloads of the demo circuit.
const OVERLOAD_PERIOD: u64 = 25;

/// Ticks between self-driving toggles.
const TOGGLE_PERIOD: u64 = 10;

/// Sounds known to the demo world.
pub fn sound_library() -> SoundLibrary {
    SoundLibrary::new()
        .with_sound(ALARM_SOUND, 0.5)
        .with_sound("chime", 1.0)
}

/// Handles to the objects the demo spawns.
#[derive(Debug, Clone)]
pub struct DemoFactory {
    /// Trains on the demo network.
    pub trains: Vec<Arc<Train>>,
    /// Connectors items are grabbed from.
    pub connectors: Vec<Arc<FactoryConnector>>,
    /// The factory's power circuit.
    pub circuit: Arc<PowerCircuit>,
    /// The alarm speaker.
    pub siren: Arc<SpeakerPole>,
}

impl DemoFactory {
    /// Spawn the demo objects into `world`.
    pub fn build(world: &World) -> Self {
        let factory = Self {
            trains: vec![world.spawn_train("Ore Express"), world.spawn_train("Coal Runner")],
            connectors: vec![
                world.spawn_connector("Smelter Output"),
                world.spawn_connector("Constructor Output"),
                world.spawn_connector("Assembler Output"),
            ],
            circuit: world.spawn_circuit("Main Grid", 100.0),
            siren: world.spawn_speaker("Control Room Siren"),
        };
        info!(objects = world.len(), "Demo factory built");
        factory
    }

    /// Every object as an emitter.
    pub fn emitters(&self) -> Vec<Arc<dyn Emitter>> {
        let mut emitters: Vec<Arc<dyn Emitter>> = Vec::new();
        emitters.extend(self.trains.iter().map(|t| Arc::clone(t) as Arc<dyn Emitter>));
        emitters.extend(
            self.connectors
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn Emitter>),
        );
        emitters.push(Arc::clone(&self.circuit) as Arc<dyn Emitter>);
        emitters.push(Arc::clone(&self.siren) as Arc<dyn Emitter>);
        emitters
    }

    /// Subscribe `queue` to every object; returns how many listeners were new.
    pub fn subscribe(&self, session: &Session, queue: &Arc<SignalQueue>) -> usize {
        self.emitters()
            .iter()
            .filter(|sender| {
                let path = vec![sender.id()];
                session.subsystem().add_listener(sender, Trace::new(queue, path))
            })
            .count()
    }

    /// The siren's id.
    pub fn siren_id(&self) -> ObjectId {
        self.siren.id()
    }
}

/// Drives the demo factory from the simulation side of each tick.
#[derive(Debug)]
pub struct FactoryDriver {
    factory: DemoFactory,
    items_grabbed: u64,
}

impl FactoryDriver {
    /// A driver for `factory`.
    pub const fn new(factory: DemoFactory) -> Self {
        Self {
            factory,
            items_grabbed: 0,
        }
    }

    /// Items grabbed from connectors so far.
    pub const fn items_grabbed(&self) -> u64 {
        self.items_grabbed
    }
}

impl TickCallback for FactoryDriver {
    fn on_tick(&mut self, report: &TickReport, _session: &Session) {
        let tick = report.tick;

        let item = usize::try_from(tick)
            .ok()
            .and_then(|t| t.checked_rem(ITEMS.len()))
            .and_then(|i| ITEMS.get(i))
            .copied()
            .unwrap_or("iron_plate");
        for connector in &self.factory.connectors {
            connector.push_input(ItemStack::new(item, 1));
            if connector.grab_output(None).is_some() {
                self.items_grabbed = self.items_grabbed.saturating_add(1);
            }
        }

        if tick.checked_rem(TOGGLE_PERIOD) == Some(0) {
            for train in &self.factory.trains {
                train.set_self_driving(!train.is_self_driving());
            }
        }

        let circuit = &self.factory.circuit;
        if tick.checked_rem(OVERLOAD_PERIOD) == Some(0) {
            debug!(tick, "Overloading main grid");
            circuit.set_load(circuit.capacity() * 2.0);
        } else if circuit.is_fuse_triggered() {
            circuit.set_load(circuit.capacity() * 0.5);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::time::Duration;

    use hookline_core::registry::HookRegistry;
    use hookline_core::world::NativeSeams;
    use hookline_types::{HookKind, names};

    use super::*;

    fn session() -> Session {
        let world = Arc::new(World::new(Arc::new(NativeSeams::new()), sound_library()));
        Session::start(world, Arc::new(HookRegistry::builtin()))
    }

    #[test]
    fn subscribe_attaches_hooks_for_each_object() {
        let session = session();
        let factory = DemoFactory::build(session.world());
        let queue = Arc::new(SignalQueue::new(64));

        assert_eq!(factory.subscribe(&session, &queue), 7);
        assert_eq!(factory.subscribe(&session, &queue), 0);
        assert_eq!(
            session.subsystem().hooked_kinds(factory.circuit.id()),
            vec![HookKind::PowerFuse]
        );
        assert!(session.subsystem().hooked_kinds(factory.siren_id()).is_empty());
    }

    #[test]
    fn driver_grabs_toggles_and_overloads() {
        let mut session = session();
        let factory = DemoFactory::build(session.world());
        let queue = Arc::new(SignalQueue::new(256));
        factory.subscribe(&session, &queue);
        let mut driver = FactoryDriver::new(factory.clone());

        for _ in 0..OVERLOAD_PERIOD {
            let report = session.tick(Duration::from_millis(100));
            driver.on_tick(&report, &session);
        }
        assert_eq!(driver.items_grabbed(), 3 * OVERLOAD_PERIOD);
        // Toggled on at tick 10 and off again at tick 20.
        assert!(factory.trains.iter().all(|t| !t.is_self_driving()));
        let updates = queue
            .drain()
            .iter()
            .filter(|q| q.signal.name() == names::SELF_DRIVING_UPDATE)
            .count();
        assert_eq!(updates, 4);

        // Overloaded after tick 25; the next tick trips the fuse.
        let report = session.tick(Duration::from_millis(100));
        assert!(factory.circuit.is_fuse_triggered());
        driver.on_tick(&report, &session);
        assert!(factory.circuit.load() < factory.circuit.capacity());
    }
}

//! The scripting-domain task.
//!
//! Stands in for a user script: it waits on a [`SignalQueue`], reacts to
//! each signal, and changes the world only by submitting futures. It
//! never touches world state directly, so it can run on any task.

use std::collections::HashMap;
use std::sync::Arc;

use hookline_core::future::{Deferred, FutureSubmitter};
use hookline_core::sink::{QueuedSignal, SignalQueue};
use hookline_core::world::{PlaySoundFuture, ResetFuseFuture, World, WorldObject};
use hookline_types::{ObjectId, SignalValue, SoundEvent, names};
use tracing::{debug, info, warn};

/// Counters collected by a finished [`Script`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptStats {
    /// Signals received.
    pub signals: u64,
    /// Items moved, summed over every `ItemTransfer`.
    pub items_transferred: u64,
    /// Times a fuse was seen going from intact to blown.
    pub fuse_trips: u64,
    /// Reset futures accepted by the simulation side.
    pub resets_requested: u64,
    /// `SelfDrivingUpdate` signals received.
    pub self_driving_updates: u64,
    /// Sounds reported as finished.
    pub sounds_finished: u64,
}

/// A listener script reacting to signals.
pub struct Script {
    queue: Arc<SignalQueue>,
    submitter: FutureSubmitter,
    world: Arc<World>,
    alarm: Option<(ObjectId, String)>,
    fuses: HashMap<ObjectId, bool>,
    stats: ScriptStats,
}

impl Script {
    /// A script reading `queue` and submitting through `submitter`.
    pub fn new(queue: Arc<SignalQueue>, submitter: FutureSubmitter, world: Arc<World>) -> Self {
        Self {
            queue,
            submitter,
            world,
            alarm: None,
            fuses: HashMap::new(),
            stats: ScriptStats::default(),
        }
    }

    /// Play `sound` on `speaker` whenever a fuse blows.
    #[must_use]
    pub fn with_alarm(mut self, speaker: ObjectId, sound: impl Into<String>) -> Self {
        self.alarm = Some((speaker, sound.into()));
        self
    }

    /// Handle signals until the queue is closed and drained.
    pub async fn run(mut self) -> ScriptStats {
        info!(listener = %self.queue_id(), "Script started");
        while let Some(queued) = self.queue.recv().await {
            self.handle(&queued);
        }
        info!(
            signals = self.stats.signals,
            items = self.stats.items_transferred,
            fuse_trips = self.stats.fuse_trips,
            "Script finished"
        );
        self.stats
    }

    fn queue_id(&self) -> hookline_types::ListenerId {
        use hookline_core::sink::SignalListener as _;
        self.queue.listener_id()
    }

    fn handle(&mut self, queued: &QueuedSignal) {
        self.stats.signals = self.stats.signals.saturating_add(1);
        let signal = &queued.signal;
        match signal.name() {
            names::ITEM_TRANSFER => {
                if let Some(SignalValue::Item(stack)) = signal.args().first() {
                    self.stats.items_transferred = self
                        .stats
                        .items_transferred
                        .saturating_add(u64::from(stack.amount));
                    debug!(item = %stack.item, amount = stack.amount, "Item transferred");
                }
            }
            names::POWER_FUSE_CHANGED => {
                if let Some(sender) = queued.sender {
                    self.fuse_changed(sender);
                }
            }
            names::SELF_DRIVING_UPDATE => {
                self.stats.self_driving_updates = self.stats.self_driving_updates.saturating_add(1);
                if let Some(SignalValue::Bool(enabled)) = signal.args().first() {
                    info!(sender = ?queued.sender, enabled, "Self-driving changed");
                }
            }
            names::SPEAKER_SOUND => {
                if let Some(SignalValue::Int(code)) = signal.args().first()
                    && *code == SoundEvent::Finished.code()
                {
                    self.stats.sounds_finished = self.stats.sounds_finished.saturating_add(1);
                }
            }
            other => debug!(signal = other, "Unhandled signal"),
        }
    }

    /// `PowerFuseChanged` carries no state; the script keeps its own view
    /// and flips it on every change.
    fn fuse_changed(&mut self, circuit_id: ObjectId) {
        let blown = {
            let entry = self.fuses.entry(circuit_id).or_insert(false);
            *entry = !*entry;
            *entry
        };
        if !blown {
            info!(circuit = %circuit_id, "Fuse restored");
            return;
        }

        self.stats.fuse_trips = self.stats.fuse_trips.saturating_add(1);
        warn!(circuit = %circuit_id, "Fuse blown, requesting reset");

        if let Some(WorldObject::Circuit(circuit)) = self.world.object(circuit_id)
            && self.submit(ResetFuseFuture::new(circuit))
        {
            self.stats.resets_requested = self.stats.resets_requested.saturating_add(1);
        }

        if let Some((speaker_id, sound)) = &self.alarm
            && let Some(WorldObject::Speaker(speaker)) = self.world.object(*speaker_id)
        {
            let alarm = PlaySoundFuture::new(speaker, sound.clone(), 0.0);
            self.submit(alarm);
        }
    }

    fn submit(&self, task: impl Deferred) -> bool {
        match self.submitter.submit(task) {
            Ok(handle) => {
                debug!(task = handle.task(), "Future submitted");
                true
            }
            Err(e) => {
                warn!(error = %e, "Future refused");
                false
            }
        }
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("listener", &self.queue_id())
            .field("alarm", &self.alarm)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use hookline_core::registry::HookRegistry;
    use hookline_core::session::Session;
    use hookline_core::sink::Trace;
    use hookline_core::world::{Emitter, NativeSeams, SoundLibrary};
    use hookline_types::ItemStack;

    use super::*;

    fn session() -> Session {
        let sounds = SoundLibrary::new().with_sound("alarm", 0.2);
        let world = Arc::new(World::new(Arc::new(NativeSeams::new()), sounds));
        Session::start(world, Arc::new(HookRegistry::builtin()))
    }

    fn listen(session: &Session, sender: Arc<dyn Emitter>, queue: &Arc<SignalQueue>) {
        let path = vec![sender.id()];
        session.subsystem().add_listener(&sender, Trace::new(queue, path));
    }

    #[tokio::test]
    async fn blown_fuse_is_reset_through_a_future() {
        let mut session = session();
        let circuit = session.world().spawn_circuit("Grid", 10.0);
        let speaker = session.world().spawn_speaker("Siren");
        let queue = Arc::new(SignalQueue::new(32));
        listen(&session, Arc::clone(&circuit) as Arc<dyn Emitter>, &queue);
        listen(&session, Arc::clone(&speaker) as Arc<dyn Emitter>, &queue);

        let script = Script::new(
            Arc::clone(&queue),
            session.submitter(),
            Arc::clone(session.world()),
        )
        .with_alarm(speaker.id(), "alarm");
        let task = tokio::spawn(script.run());

        circuit.set_load(20.0);
        session.tick(Duration::from_millis(100));
        assert!(circuit.is_fuse_triggered());
        circuit.set_load(1.0);

        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            session.tick(Duration::from_millis(100));
            if !circuit.is_fuse_triggered() && speaker.current_sound().is_none() {
                break;
            }
        }
        assert!(!circuit.is_fuse_triggered());

        queue.close();
        let stats = task.await.unwrap();
        assert_eq!(stats.fuse_trips, 1);
        assert_eq!(stats.resets_requested, 1);
        assert_eq!(stats.sounds_finished, 1);
    }

    #[tokio::test]
    async fn counts_transferred_items() {
        let session = session();
        let connector = session.world().spawn_connector("Belt");
        let queue = Arc::new(SignalQueue::new(32));
        listen(&session, Arc::clone(&connector) as Arc<dyn Emitter>, &queue);

        connector.stock(ItemStack::new("screw", 4));
        connector.push_input(ItemStack::new("screw", 2));
        assert!(connector.grab_output(None).is_some());
        assert!(connector.grab_output(None).is_some());
        queue.close();

        let script = Script::new(
            Arc::clone(&queue),
            session.submitter(),
            Arc::clone(session.world()),
        );
        let stats = script.run().await;
        assert_eq!(stats.signals, 2);
        assert_eq!(stats.items_transferred, 6);
        assert_eq!(stats.fuse_trips, 0);
    }
}

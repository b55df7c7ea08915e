//! The simulated world that hosts emitting objects.
//!
//! The world owns every object and the [`NativeSeams`] their native
//! operations run through. The hook subsystem never owns objects; it refers
//! to them by [`ObjectId`] and borrows them as [`Emitter`]s.
//!
//! # Modules
//!
//! - [`circuit`] -- Power circuits with a fuse
//! - [`connector`] -- Factory connectors with nested grab operations
//! - [`delegate`] -- Multicast delegates
//! - [`speaker`] -- Speaker poles and their sound library
//! - [`train`] -- Trains with a self-driving delegate

pub mod circuit;
pub mod connector;
pub mod delegate;
pub mod speaker;
pub mod train;

use std::collections::BTreeMap;
use std::sync::Arc;

use hookline_types::{Capability, NativeOperation, ObjectId};
use parking_lot::RwLock;
use tracing::debug;

pub use circuit::{PowerCircuit, ResetFuseFuture, TickCircuit};
pub use connector::{FactoryConnector, GrabCall, GrabOutput, GrabOutputInventory};
pub use delegate::{Delegate, DelegateHandle};
pub use speaker::{PlaySoundFuture, SoundLibrary, SpeakerPole, StopSoundFuture};
pub use train::{SetSelfDrivingFuture, Train};

use crate::seam::{Seam, SeamHandle};

/// An object that can have listeners and emit signals.
pub trait Emitter: Send + Sync {
    /// Identity of the object.
    fn id(&self) -> ObjectId;

    /// Display name.
    fn name(&self) -> &str;

    /// Capabilities the object declares; they select its hooks.
    fn capabilities(&self) -> &[Capability];

    /// The object as a train, if it is one.
    fn as_train(&self) -> Option<&Train> {
        None
    }

    /// The object as a factory connector, if it is one.
    fn as_connector(&self) -> Option<&FactoryConnector> {
        None
    }

    /// The object as a power circuit, if it is one.
    fn as_circuit(&self) -> Option<&PowerCircuit> {
        None
    }

    /// The object as a speaker, if it is one.
    fn as_speaker(&self) -> Option<&SpeakerPole> {
        None
    }
}

// ---------------------------------------------------------------------------
// Native seams
// ---------------------------------------------------------------------------

/// One seam per native operation, shared by every object of the class.
#[derive(Debug)]
pub struct NativeSeams {
    /// `FactoryConnector::grab_output`.
    pub grab_output: Seam<GrabOutput, bool>,
    /// `FactoryConnector::grab_output_inventory`.
    pub grab_output_inventory: Seam<GrabOutputInventory, bool>,
    /// `PowerCircuit::tick_circuit`.
    pub tick_circuit: Seam<TickCircuit, ()>,
}

impl NativeSeams {
    /// Seams for a host where every operation can be patched.
    pub fn new() -> Self {
        Self::with_unpatchable(&[])
    }

    /// Seams where the listed operations refuse interception.
    pub fn with_unpatchable(unpatchable: &[NativeOperation]) -> Self {
        fn seam<A, R>(operation: NativeOperation, unpatchable: &[NativeOperation]) -> Seam<A, R> {
            if unpatchable.contains(&operation) {
                Seam::unpatchable(operation)
            } else {
                Seam::new(operation)
            }
        }

        Self {
            grab_output: seam(NativeOperation::FactoryGrabOutput, unpatchable),
            grab_output_inventory: seam(NativeOperation::FactoryGrabOutputInventory, unpatchable),
            tick_circuit: seam(NativeOperation::PowerTickCircuit, unpatchable),
        }
    }

    /// Remove the handler `handle` from the seam of `operation`.
    ///
    /// Returns `false` if that seam holds no such handler.
    pub fn uninstall(&self, operation: NativeOperation, handle: SeamHandle) -> bool {
        match operation {
            NativeOperation::FactoryGrabOutput => self.grab_output.uninstall(handle),
            NativeOperation::FactoryGrabOutputInventory => {
                self.grab_output_inventory.uninstall(handle)
            }
            NativeOperation::PowerTickCircuit => self.tick_circuit.uninstall(handle),
        }
    }
}

impl Default for NativeSeams {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// An object held by the world.
#[derive(Debug, Clone)]
pub enum WorldObject {
    /// A train.
    Train(Arc<Train>),
    /// A factory connector.
    Connector(Arc<FactoryConnector>),
    /// A power circuit.
    Circuit(Arc<PowerCircuit>),
    /// A speaker pole.
    Speaker(Arc<SpeakerPole>),
}

impl WorldObject {
    /// The object as a type-erased emitter.
    pub fn as_emitter(&self) -> Arc<dyn Emitter> {
        match self {
            Self::Train(train) => Arc::clone(train) as Arc<dyn Emitter>,
            Self::Connector(connector) => Arc::clone(connector) as Arc<dyn Emitter>,
            Self::Circuit(circuit) => Arc::clone(circuit) as Arc<dyn Emitter>,
            Self::Speaker(speaker) => Arc::clone(speaker) as Arc<dyn Emitter>,
        }
    }
}

/// Object table for one world session.
#[derive(Debug)]
pub struct World {
    seams: Arc<NativeSeams>,
    sounds: Arc<SoundLibrary>,
    objects: RwLock<BTreeMap<ObjectId, WorldObject>>,
}

impl World {
    /// An empty world whose native operations run through `seams`.
    pub fn new(seams: Arc<NativeSeams>, sounds: SoundLibrary) -> Self {
        Self {
            seams,
            sounds: Arc::new(sounds),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// The seams shared by every object.
    pub const fn seams(&self) -> &Arc<NativeSeams> {
        &self.seams
    }

    /// The sound library speakers play from.
    pub const fn sounds(&self) -> &Arc<SoundLibrary> {
        &self.sounds
    }

    /// Spawn a train with a fresh id.
    pub fn spawn_train(&self, name: &str) -> Arc<Train> {
        self.spawn_train_with_id(ObjectId::new(), name)
    }

    /// Spawn a train with a known id.
    pub fn spawn_train_with_id(&self, id: ObjectId, name: &str) -> Arc<Train> {
        let train = Arc::new(Train::new(id, name.to_owned()));
        self.insert(WorldObject::Train(Arc::clone(&train)));
        train
    }

    /// Spawn a factory connector with a fresh id.
    pub fn spawn_connector(&self, name: &str) -> Arc<FactoryConnector> {
        self.spawn_connector_with_id(ObjectId::new(), name)
    }

    /// Spawn a factory connector with a known id.
    pub fn spawn_connector_with_id(&self, id: ObjectId, name: &str) -> Arc<FactoryConnector> {
        let connector = Arc::new(FactoryConnector::new(
            id,
            name.to_owned(),
            Arc::clone(&self.seams),
        ));
        self.insert(WorldObject::Connector(Arc::clone(&connector)));
        connector
    }

    /// Spawn a power circuit with a fresh id.
    pub fn spawn_circuit(&self, name: &str, capacity: f64) -> Arc<PowerCircuit> {
        self.spawn_circuit_with_id(ObjectId::new(), name, capacity)
    }

    /// Spawn a power circuit with a known id.
    pub fn spawn_circuit_with_id(&self, id: ObjectId, name: &str, capacity: f64) -> Arc<PowerCircuit> {
        let circuit = Arc::new(PowerCircuit::new(
            id,
            name.to_owned(),
            capacity,
            Arc::clone(&self.seams),
        ));
        self.insert(WorldObject::Circuit(Arc::clone(&circuit)));
        circuit
    }

    /// Spawn a speaker pole with a fresh id.
    pub fn spawn_speaker(&self, name: &str) -> Arc<SpeakerPole> {
        self.spawn_speaker_with_id(ObjectId::new(), name)
    }

    /// Spawn a speaker pole with a known id.
    pub fn spawn_speaker_with_id(&self, id: ObjectId, name: &str) -> Arc<SpeakerPole> {
        let speaker = Arc::new(SpeakerPole::new(
            id,
            name.to_owned(),
            Arc::clone(&self.sounds),
        ));
        self.insert(WorldObject::Speaker(Arc::clone(&speaker)));
        speaker
    }

    fn insert(&self, object: WorldObject) {
        let emitter = object.as_emitter();
        debug!(object = %emitter.id(), name = emitter.name(), capabilities = ?emitter.capabilities(), "Object spawned");
        self.objects.write().insert(emitter.id(), object);
    }

    /// Look up an object.
    pub fn object(&self, id: ObjectId) -> Option<WorldObject> {
        self.objects.read().get(&id).cloned()
    }

    /// Look up an object as an emitter.
    pub fn emitter(&self, id: ObjectId) -> Option<Arc<dyn Emitter>> {
        self.objects.read().get(&id).map(WorldObject::as_emitter)
    }

    /// Remove an object from the world. Its hook data is not touched.
    pub fn remove(&self, id: ObjectId) -> Option<WorldObject> {
        self.objects.write().remove(&id)
    }

    /// Every power circuit, in id order.
    pub fn circuits(&self) -> Vec<Arc<PowerCircuit>> {
        self.objects
            .read()
            .values()
            .filter_map(|object| match object {
                WorldObject::Circuit(circuit) => Some(Arc::clone(circuit)),
                _ => None,
            })
            .collect()
    }

    /// Every speaker pole, in id order.
    pub fn speakers(&self) -> Vec<Arc<SpeakerPole>> {
        self.objects
            .read()
            .values()
            .filter_map(|object| match object {
                WorldObject::Speaker(speaker) => Some(Arc::clone(speaker)),
                _ => None,
            })
            .collect()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the world is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

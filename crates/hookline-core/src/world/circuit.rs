//! Power circuits.
//!
//! `tick_circuit` is the native operation. Each tick applies a pending
//! fuse reset, then trips the fuse if the load exceeds capacity.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hookline_types::{Capability, ObjectId};
use parking_lot::Mutex;

use super::{Emitter, NativeSeams};
use crate::future::Deferred;
use crate::subsystem::HookSubsystem;

/// Arguments of `PowerCircuit::tick_circuit`.
#[derive(Debug, Clone)]
pub struct TickCircuit {
    /// The circuit being ticked.
    pub circuit: Arc<PowerCircuit>,
    /// Seconds since the previous tick.
    pub dt: f32,
}

#[derive(Debug, Default)]
struct Grid {
    load: f64,
    capacity: f64,
    reset_requested: bool,
    uptime: f64,
}

/// A power circuit in the world.
#[derive(Debug)]
pub struct PowerCircuit {
    id: ObjectId,
    name: String,
    capabilities: Vec<Capability>,
    seams: Arc<NativeSeams>,
    fuse_triggered: AtomicBool,
    grid: Mutex<Grid>,
}

impl PowerCircuit {
    pub(crate) fn new(id: ObjectId, name: String, capacity: f64, seams: Arc<NativeSeams>) -> Self {
        Self {
            id,
            name,
            capabilities: vec![Capability::PowerCircuit],
            seams,
            fuse_triggered: AtomicBool::new(false),
            grid: Mutex::new(Grid {
                capacity,
                ..Grid::default()
            }),
        }
    }

    /// Whether the fuse has blown.
    pub fn is_fuse_triggered(&self) -> bool {
        self.fuse_triggered.load(Ordering::Acquire)
    }

    /// Current consumption in MW.
    pub fn load(&self) -> f64 {
        self.grid.lock().load
    }

    /// Production capacity in MW.
    pub fn capacity(&self) -> f64 {
        self.grid.lock().capacity
    }

    /// Set the consumption; takes effect on the next tick.
    pub fn set_load(&self, load: f64) {
        self.grid.lock().load = load;
    }

    /// Set the production capacity; takes effect on the next tick.
    pub fn set_capacity(&self, capacity: f64) {
        self.grid.lock().capacity = capacity;
    }

    /// Ask for the fuse to be reset on the next tick.
    pub fn reset_fuse(&self) {
        self.grid.lock().reset_requested = true;
    }

    /// Seconds the circuit has been powered since the last trip.
    pub fn uptime(&self) -> f64 {
        self.grid.lock().uptime
    }

    /// Advance the circuit by `dt` seconds (native operation).
    pub fn tick_circuit(self: &Arc<Self>, dt: f32) {
        let mut args = TickCircuit {
            circuit: Arc::clone(self),
            dt,
        };
        self.seams
            .tick_circuit
            .call(&mut args, &|args: &mut TickCircuit| {
                args.circuit.tick_native(args.dt);
            });
    }

    fn tick_native(&self, dt: f32) {
        let mut grid = self.grid.lock();
        if grid.reset_requested {
            grid.reset_requested = false;
            self.fuse_triggered.store(false, Ordering::Release);
        }
        if self.is_fuse_triggered() {
            return;
        }
        if grid.load > grid.capacity {
            self.fuse_triggered.store(true, Ordering::Release);
            grid.uptime = 0.0;
        } else {
            grid.uptime += f64::from(dt);
        }
    }
}

impl Emitter for PowerCircuit {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn as_circuit(&self) -> Option<&PowerCircuit> {
        Some(self)
    }
}

/// Deferred request to reset a circuit's fuse.
#[derive(Debug)]
pub struct ResetFuseFuture {
    circuit: Arc<PowerCircuit>,
}

impl ResetFuseFuture {
    /// Capture the circuit to reset.
    pub const fn new(circuit: Arc<PowerCircuit>) -> Self {
        Self { circuit }
    }
}

impl Deferred for ResetFuseFuture {
    fn name(&self) -> &'static str {
        "reset_fuse"
    }

    fn execute(self: Box<Self>, _subsystem: &HookSubsystem) {
        self.circuit.reset_fuse();
    }
}

//! Trains.
//!
//! A train exposes its self-driving flag through a delegate that fires
//! only when the flag actually changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hookline_types::{Capability, ObjectId};

use super::delegate::Delegate;
use super::Emitter;
use crate::future::Deferred;
use crate::subsystem::HookSubsystem;

/// A train in the world.
#[derive(Debug)]
pub struct Train {
    id: ObjectId,
    name: String,
    capabilities: Vec<Capability>,
    self_driving: AtomicBool,
    self_driving_changed: Delegate<bool>,
}

impl Train {
    pub(crate) fn new(id: ObjectId, name: String) -> Self {
        Self {
            id,
            name,
            capabilities: vec![Capability::Train],
            self_driving: AtomicBool::new(false),
            self_driving_changed: Delegate::new(),
        }
    }

    /// Whether the train drives itself.
    pub fn is_self_driving(&self) -> bool {
        self.self_driving.load(Ordering::Acquire)
    }

    /// Switch self-driving on or off; fires the delegate on change.
    pub fn set_self_driving(&self, enabled: bool) {
        let previous = self.self_driving.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            self.self_driving_changed.broadcast(&enabled);
        }
    }

    /// Delegate fired with the new flag whenever self-driving changes.
    pub const fn self_driving_changed(&self) -> &Delegate<bool> {
        &self.self_driving_changed
    }
}

impl Emitter for Train {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn as_train(&self) -> Option<&Train> {
        Some(self)
    }
}

/// Deferred request to change a train's self-driving flag.
#[derive(Debug)]
pub struct SetSelfDrivingFuture {
    train: Arc<Train>,
    enabled: bool,
}

impl SetSelfDrivingFuture {
    /// Capture the train and the requested flag.
    pub const fn new(train: Arc<Train>, enabled: bool) -> Self {
        Self { train, enabled }
    }
}

impl Deferred for SetSelfDrivingFuture {
    fn name(&self) -> &'static str {
        "set_self_driving"
    }

    fn execute(self: Box<Self>, _subsystem: &HookSubsystem) {
        self.train.set_self_driving(self.enabled);
    }
}

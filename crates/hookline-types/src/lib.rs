//! Shared type definitions for Hookline.
//!
//! Plain data shared by the core and the engine binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for objects and listeners
//! - [`enums`] -- Capabilities, hook kinds, native operations, sound events
//! - [`signal`] -- Immutable signal payloads and their argument values
//! - [`snapshot`] -- Persisted records of listeners and attached hooks

pub mod enums;
pub mod ids;
pub mod signal;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use enums::{Capability, HookKind, NativeOperation, SoundEvent};
pub use ids::{ListenerId, ObjectId};
pub use signal::{ItemStack, Signal, SignalValue, names};
pub use snapshot::{HookRecord, HookSnapshot, TraceRecord};

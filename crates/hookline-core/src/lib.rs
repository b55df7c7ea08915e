//! Hook installation, listener registry, signal emission, and deferred
//! calls for Hookline.
//!
//! Objects in a simulated world produce state-change events from inside
//! native operations the scripting side cannot see into. This crate
//! intercepts those operations once per operation, attaches per-object
//! hooks only while somebody listens, collapses nested calls into single
//! logical events, and fans the resulting signals out to listener traces.
//! Scripts act on the world only through futures run on the simulation
//! tick.
//!
//! # Modules
//!
//! - [`coalescer`] -- Call-depth counters that collapse nested calls
//! - [`config`] -- Configuration loading from `hookline-config.yaml`
//! - [`control`] -- Pause, stop, and tick-speed flags for a running session
//! - [`error`] -- Error enums for installation, delivery, futures, persistence
//! - [`future`] -- [`Deferred`] tasks and the [`FutureQueue`]
//! - [`hooks`] -- The hook trait and its three variants
//! - [`installer`] -- One-shot interception installation
//! - [`persistence`] -- Save and restore of listener traces and hook kinds
//! - [`registry`] -- Capability to hook-kind table
//! - [`seam`] -- Interception points for native operations
//! - [`session`] -- World sessions and the tick loop
//! - [`sink`] -- Listener interface, traces, and the bounded signal queue
//! - [`subsystem`] -- [`HookSubsystem`]: listener registry and emission
//! - [`world`] -- The simulated world and its emitting objects
//!
//! [`Deferred`]: future::Deferred
//! [`FutureQueue`]: future::FutureQueue
//! [`HookSubsystem`]: subsystem::HookSubsystem

pub mod coalescer;
pub mod config;
pub mod control;
pub mod error;
pub mod future;
pub mod hooks;
pub mod installer;
pub mod persistence;
pub mod registry;
pub mod seam;
pub mod session;
pub mod sink;
pub mod subsystem;
pub mod world;

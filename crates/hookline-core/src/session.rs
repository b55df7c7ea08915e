//! World sessions and the tick loop.
//!
//! A [`Session`] ties one [`World`] to one [`HookSubsystem`] and owns the
//! simulation end of the future queue. [`Session::tick`] is the whole
//! simulation-domain step: run the futures scripts submitted, tick every
//! power circuit through its seam, and advance speaker playback.
//!
//! [`run_session`] drives `tick` on an interval until the tick limit is
//! reached or a stop is requested.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hookline_types::HookSnapshot;
use tracing::{debug, info};

use crate::control::{SessionControl, SessionEndReason};
use crate::error::PersistenceError;
use crate::future::{FutureQueue, FutureSubmitter};
use crate::persistence::{self, ListenerDirectory, RestoreReport};
use crate::registry::HookRegistry;
use crate::subsystem::HookSubsystem;
use crate::world::World;

/// Errors from session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Saving or loading the hook snapshot failed.
    #[error("persistence error: {source}")]
    Persistence {
        /// The underlying persistence error.
        #[from]
        source: PersistenceError,
    },
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Number of the tick that just ran, starting at 1.
    pub tick: u64,
    /// Futures executed this tick.
    pub futures_executed: usize,
    /// Power circuits ticked.
    pub circuits_ticked: usize,
    /// Speakers advanced.
    pub speakers_ticked: usize,
}

/// One world session.
#[derive(Debug)]
pub struct Session {
    world: Arc<World>,
    subsystem: Arc<HookSubsystem>,
    futures: FutureQueue,
    submitter: FutureSubmitter,
    listeners: Arc<ListenerDirectory>,
    ticks: u64,
}

impl Session {
    /// Start a session over `world`.
    pub fn start(world: Arc<World>, registry: Arc<HookRegistry>) -> Self {
        let subsystem = HookSubsystem::new(registry, Arc::clone(world.seams()));
        let (submitter, futures) = FutureQueue::new();
        info!(objects = world.len(), "Session started");
        Self {
            world,
            subsystem,
            futures,
            submitter,
            listeners: Arc::new(ListenerDirectory::new()),
            ticks: 0,
        }
    }

    /// The world this session runs.
    pub const fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// The session's hook subsystem.
    pub const fn subsystem(&self) -> &Arc<HookSubsystem> {
        &self.subsystem
    }

    /// A handle scripts use to submit futures.
    pub fn submitter(&self) -> FutureSubmitter {
        self.submitter.clone()
    }

    /// Listeners that saved traces can be resolved against on load.
    pub const fn listeners(&self) -> &Arc<ListenerDirectory> {
        &self.listeners
    }

    /// Ticks completed so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one simulation step of `dt`.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let seconds = dt.as_secs_f32();
        let futures_executed = self.futures.drain(&self.subsystem);

        let circuits = self.world.circuits();
        for circuit in &circuits {
            circuit.tick_circuit(seconds);
        }

        let speakers = self.world.speakers();
        for speaker in &speakers {
            speaker.tick(&self.subsystem, seconds);
        }

        self.ticks = self.ticks.saturating_add(1);
        let report = TickReport {
            tick: self.ticks,
            futures_executed,
            circuits_ticked: circuits.len(),
            speakers_ticked: speakers.len(),
        };
        debug!(
            tick = report.tick,
            futures = report.futures_executed,
            circuits = report.circuits_ticked,
            speakers = report.speakers_ticked,
            "Tick complete"
        );
        report
    }

    /// Capture the current hook data.
    pub fn save(&self) -> HookSnapshot {
        self.subsystem.save()
    }

    /// Save the hook data to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Persistence`] if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<HookSnapshot, SessionError> {
        let snapshot = self.save();
        persistence::write_snapshot(path, &snapshot)?;
        info!(path = %path.display(), objects = snapshot.records.len(), "Hook snapshot written");
        Ok(snapshot)
    }

    /// Replace the hook data with `snapshot`.
    pub fn load(&self, snapshot: &HookSnapshot) -> RestoreReport {
        self.subsystem
            .restore(snapshot, &self.world, self.listeners.as_ref())
    }

    /// Load hook data saved by [`save_to`](Self::save_to).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Persistence`] if the file cannot be read or
    /// decoded.
    pub fn load_from(&self, path: &Path) -> Result<RestoreReport, SessionError> {
        let snapshot = persistence::read_snapshot(path)?;
        Ok(self.load(&snapshot))
    }

    /// End the session.
    ///
    /// Returns the final hook data. Futures still queued are dropped without
    /// running and their waiters see [`FutureError::Dropped`]. Later
    /// submissions fail. Every hook is detached and the session's handlers
    /// leave the world's seams, so the next session on the same world
    /// installs its own.
    ///
    /// [`FutureError::Dropped`]: crate::error::FutureError::Dropped
    pub fn shutdown(mut self) -> HookSnapshot {
        let snapshot = self.save();
        let dropped = self.futures.close();
        self.subsystem.clear();
        info!(
            ticks = self.ticks,
            objects = snapshot.records.len(),
            futures_dropped = dropped,
            "Session shut down"
        );
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Tick loop
// ---------------------------------------------------------------------------

/// Result of a [`run_session`] loop.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Why the loop ended.
    pub end_reason: SessionEndReason,
    /// The last tick report, if any tick ran.
    pub final_report: Option<TickReport>,
    /// Ticks run by this loop.
    pub total_ticks: u64,
    /// Futures executed across all ticks of this loop.
    pub futures_executed: usize,
}

/// Callback invoked after each tick.
pub trait TickCallback: Send {
    /// Called after a tick completes.
    fn on_tick(&mut self, report: &TickReport, session: &Session);
}

/// A tick callback that does nothing.
#[derive(Debug, Default)]
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport, _session: &Session) {}
}

/// Tick `session` until the tick limit or a stop request.
///
/// Each tick advances the world by `step`; between ticks the loop sleeps
/// for the control's current tick interval.
pub async fn run_session(
    session: &mut Session,
    control: &Arc<SessionControl>,
    step: Duration,
    callback: &mut dyn TickCallback,
) -> SessionResult {
    let mut final_report: Option<TickReport> = None;
    let mut total_ticks: u64 = 0;
    let mut futures_executed: usize = 0;

    info!(
        max_ticks = control.max_ticks(),
        tick_interval_ms = control.tick_interval_ms(),
        step_ms = step.as_millis(),
        "Tick loop starting"
    );

    let end_reason = loop {
        if control.is_paused() {
            info!("Session paused, waiting for resume...");
            control.wait_if_paused().await;
            info!("Session resumed");
        }

        if control.is_stop_requested() {
            info!("Stop requested");
            break SessionEndReason::StopRequested;
        }

        let report = session.tick(step);
        total_ticks = total_ticks.saturating_add(1);
        futures_executed = futures_executed.saturating_add(report.futures_executed);
        callback.on_tick(&report, session);
        final_report = Some(report);

        if control.tick_limit_reached(total_ticks) {
            info!(tick = report.tick, max_ticks = control.max_ticks(), "Tick limit reached");
            break SessionEndReason::MaxTicksReached;
        }

        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    };

    SessionResult {
        end_reason,
        final_report,
        total_ticks,
        futures_executed,
    }
}

/// Log the end of a tick loop.
pub fn log_session_end(result: &SessionResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        futures_executed = result.futures_executed,
        final_tick = result.final_report.map(|r| r.tick),
        "Session ended"
    );
}

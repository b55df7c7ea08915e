//! Hookline engine binary.
//!
//! Runs a small demo factory with the hook subsystem wired in: a script
//! task listens to every object, the tick loop drives the factory, and the
//! hook data is saved when the loop ends.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hookline-config.yaml` (or `HOOKLINE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the world and start a session
//! 4. Register the script's queue and load the previous hook snapshot
//! 5. Subscribe the script's queue to every object
//! 6. Spawn the script task
//! 7. Run the tick loop until the tick limit or Ctrl-C
//! 8. Save hook data, shut the session down, and join the script

mod demo;
mod error;
mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hookline_core::config::HooklineConfig;
use hookline_core::control::SessionControl;
use hookline_core::persistence::RestoreReport;
use hookline_core::registry::HookRegistry;
use hookline_core::session::{self, Session};
use hookline_core::sink::SignalQueue;
use hookline_core::world::{NativeSeams, World};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::demo::{ALARM_SOUND, DemoFactory, FactoryDriver};
use crate::error::EngineError;
use crate::script::Script;

/// Application entry point for the Hookline engine.
///
/// # Errors
///
/// Returns an error if configuration loading, saving, or the script task
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("hookline-engine starting");
    info!(
        tick_interval_ms = config.session.tick_interval_ms,
        tick_step_ms = config.session.tick_step_ms,
        max_ticks = config.session.max_ticks,
        queue_capacity = config.listeners.queue_capacity,
        snapshot_path = %config.persistence.snapshot_path.display(),
        "Configuration loaded"
    );

    // 3. Build the world and start a session.
    let world = Arc::new(World::new(
        Arc::new(NativeSeams::new()),
        demo::sound_library(),
    ));
    let factory = DemoFactory::build(&world);
    let registry = Arc::new(HookRegistry::builtin());
    info!(
        capabilities = registry.capabilities().count(),
        "Hook registry loaded"
    );
    let mut session = Session::start(Arc::clone(&world), registry);

    // 4. Register the script's queue and load the previous snapshot.
    let queue = Arc::new(SignalQueue::new(config.listeners.queue_capacity));
    session.listeners().register(&queue);
    restore_previous(&session, &config.persistence.snapshot_path)?;

    // 5. Subscribe the script's queue.
    let subscribed = factory.subscribe(&session, &queue);
    info!(
        listeners = subscribed,
        tracked = session.subsystem().tracked_objects().len(),
        "Script subscribed"
    );

    // 6. Spawn the script task.
    let script = Script::new(Arc::clone(&queue), session.submitter(), Arc::clone(&world))
        .with_alarm(factory.siren_id(), ALARM_SOUND);
    let script_task = tokio::spawn(script.run());

    // 7. Run the tick loop.
    let control = Arc::new(SessionControl::new(&config.session));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping");
                control.request_stop();
            }
        });
    }

    let mut driver = FactoryDriver::new(factory);
    let step = Duration::from_millis(config.session.tick_step_ms);
    let result = session::run_session(&mut session, &control, step, &mut driver).await;
    session::log_session_end(&result);
    info!(items_grabbed = driver.items_grabbed(), "Factory driver finished");

    // 8. Save, shut down, and join the script.
    session
        .save_to(&config.persistence.snapshot_path)
        .map_err(EngineError::from)?;
    let snapshot = session.shutdown();
    queue.close();

    let stats = script_task.await.map_err(|e| EngineError::Script {
        message: format!("{e}"),
    })?;

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        objects_saved = snapshot.records.len(),
        signals = stats.signals,
        items = stats.items_transferred,
        fuse_trips = stats.fuse_trips,
        resets = stats.resets_requested,
        self_driving_updates = stats.self_driving_updates,
        sounds_finished = stats.sounds_finished,
        "hookline-engine shutdown complete"
    );

    Ok(())
}

/// Load the hook snapshot at `path` into `session`, if a previous run left
/// one.
///
/// Objects the previous run spawned but this world lacks are dropped by the
/// restore and show up in the report.
fn restore_previous(
    session: &Session,
    path: &Path,
) -> Result<Option<RestoreReport>, EngineError> {
    if !path.exists() {
        info!(path = %path.display(), "No previous hook snapshot");
        return Ok(None);
    }
    let report = session.load_from(path)?;
    info!(
        path = %path.display(),
        objects_restored = report.objects_restored,
        objects_dropped = report.objects_dropped,
        traces_restored = report.traces_restored,
        traces_dropped = report.traces_dropped,
        "Previous hook snapshot loaded"
    );
    Ok(Some(report))
}

/// Load configuration from `HOOKLINE_CONFIG` or `hookline-config.yaml`.
///
/// Falls back to defaults when the file does not exist.
fn load_config() -> Result<HooklineConfig, EngineError> {
    let config_path = std::env::var("HOOKLINE_CONFIG")
        .map_or_else(|_| PathBuf::from("hookline-config.yaml"), PathBuf::from);
    if config_path.exists() {
        let config = HooklineConfig::from_file(&config_path)?;
        Ok(config)
    } else {
        let mut config = HooklineConfig::default();
        config.persistence.apply_env_overrides();
        Ok(config)
    }
}

//! Speaker poles.
//!
//! Speakers have no interceptable operation; they emit `SpeakerSound`
//! directly whenever playback starts, stops, or runs out. Sounds come
//! from a [`SoundLibrary`] that only knows names and durations.

use std::collections::BTreeMap;
use std::sync::Arc;

use hookline_types::{Capability, ObjectId, Signal, SignalValue, SoundEvent, names};
use parking_lot::Mutex;
use tracing::debug;

use super::Emitter;
use crate::future::Deferred;
use crate::subsystem::HookSubsystem;

/// Known sounds and their lengths in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundLibrary {
    sounds: BTreeMap<String, f32>,
}

impl SoundLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sound.
    #[must_use]
    pub fn with_sound(mut self, name: impl Into<String>, seconds: f32) -> Self {
        self.sounds.insert(name.into(), seconds);
        self
    }

    /// Length of `name`, if the library has it.
    pub fn duration(&self, name: &str) -> Option<f32> {
        self.sounds.get(name).copied()
    }

    /// Names of every sound, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sounds.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct Playback {
    sound: String,
    elapsed: f32,
    duration: f32,
}

/// A speaker pole in the world.
#[derive(Debug)]
pub struct SpeakerPole {
    id: ObjectId,
    name: String,
    capabilities: Vec<Capability>,
    library: Arc<SoundLibrary>,
    playback: Mutex<Option<Playback>>,
}

impl SpeakerPole {
    pub(crate) fn new(id: ObjectId, name: String, library: Arc<SoundLibrary>) -> Self {
        Self {
            id,
            name,
            capabilities: vec![Capability::Speaker],
            library,
            playback: Mutex::new(None),
        }
    }

    /// Name of the sound currently playing.
    pub fn current_sound(&self) -> Option<String> {
        self.playback.lock().as_ref().map(|p| p.sound.clone())
    }

    /// Start `sound` at `start` seconds in.
    ///
    /// A sound already playing is stopped first. Returns `false` and emits
    /// nothing if the library has no such sound.
    pub fn play_sound(&self, subsystem: &HookSubsystem, sound: &str, start: f32) -> bool {
        let Some(duration) = self.library.duration(sound) else {
            debug!(speaker = %self.id, sound, "Unknown sound ignored");
            return false;
        };

        let previous = self.playback.lock().replace(Playback {
            sound: sound.to_owned(),
            elapsed: start.max(0.0),
            duration,
        });
        if let Some(previous) = previous {
            self.emit_sound(subsystem, SoundEvent::Stopped, &previous.sound);
        }
        self.emit_sound(subsystem, SoundEvent::Started, sound);
        true
    }

    /// Stop playback. Emits a stop event even when nothing was playing.
    pub fn stop_sound(&self, subsystem: &HookSubsystem) {
        let previous = self.playback.lock().take();
        let sound = previous.map(|p| p.sound).unwrap_or_default();
        self.emit_sound(subsystem, SoundEvent::Stopped, &sound);
    }

    /// Advance playback by `dt` seconds.
    pub fn tick(&self, subsystem: &HookSubsystem, dt: f32) {
        let finished = {
            let mut playback = self.playback.lock();
            let done = playback.as_mut().is_some_and(|p| {
                p.elapsed += dt;
                p.elapsed >= p.duration
            });
            if done { playback.take() } else { None }
        };
        if let Some(finished) = finished {
            self.emit_sound(subsystem, SoundEvent::Finished, &finished.sound);
        }
    }

    fn emit_sound(&self, subsystem: &HookSubsystem, event: SoundEvent, sound: &str) {
        if !subsystem.has_listeners(self.id) {
            return;
        }
        subsystem.emit(
            self.id,
            Signal::new(
                names::SPEAKER_SOUND,
                vec![SignalValue::from(event.code()), SignalValue::from(sound)],
            ),
        );
    }
}

impl Emitter for SpeakerPole {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn as_speaker(&self) -> Option<&SpeakerPole> {
        Some(self)
    }
}

/// Deferred request to start a sound.
#[derive(Debug)]
pub struct PlaySoundFuture {
    speaker: Arc<SpeakerPole>,
    sound: String,
    start: f32,
}

impl PlaySoundFuture {
    /// Capture the speaker, the sound name and the start offset.
    pub fn new(speaker: Arc<SpeakerPole>, sound: impl Into<String>, start: f32) -> Self {
        Self {
            speaker,
            sound: sound.into(),
            start,
        }
    }
}

impl Deferred for PlaySoundFuture {
    fn name(&self) -> &'static str {
        "play_sound"
    }

    fn execute(self: Box<Self>, subsystem: &HookSubsystem) {
        self.speaker.play_sound(subsystem, &self.sound, self.start);
    }
}

/// Deferred request to stop playback.
#[derive(Debug)]
pub struct StopSoundFuture {
    speaker: Arc<SpeakerPole>,
}

impl StopSoundFuture {
    /// Capture the speaker.
    pub const fn new(speaker: Arc<SpeakerPole>) -> Self {
        Self { speaker }
    }
}

impl Deferred for StopSoundFuture {
    fn name(&self) -> &'static str {
        "stop_sound"
    }

    fn execute(self: Box<Self>, subsystem: &HookSubsystem) {
        self.speaker.stop_sound(subsystem);
    }
}

//! Closed enumerations shared across the workspace.
//!
//! Capabilities describe what an emitting object *is* (and therefore which
//! hooks apply to it). Hook kinds are the persisted identifiers of hook
//! variants. Native operations identify the intercepted calls that hooks
//! subscribe to.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A class-level capability an emitting object may exhibit.
///
/// An object may have several capabilities; the hook registry maps each
/// capability to the hook kinds relevant to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// A train that can toggle self-driving.
    Train,
    /// A belt/pipe endpoint that hands items to the next machine.
    FactoryConnector,
    /// A power circuit with a fuse.
    PowerCircuit,
    /// A speaker pole that plays sounds.
    Speaker,
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Train => "train",
            Self::FactoryConnector => "factory_connector",
            Self::PowerCircuit => "power_circuit",
            Self::Speaker => "speaker",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Hook kinds
// ---------------------------------------------------------------------------

/// Identifier of a hook variant.
///
/// This is what gets persisted for attached hooks; live hook instances are
/// rebuilt from it on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HookKind {
    /// Delegate hook on a train's self-driving flag.
    SelfDriving,
    /// Multi-call hook on a factory connector's grab operations.
    ItemTransfer,
    /// State-change hook on a power circuit's fuse.
    PowerFuse,
}

impl HookKind {
    /// Every hook kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::SelfDriving, Self::ItemTransfer, Self::PowerFuse];

    /// Stable lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfDriving => "self_driving",
            Self::ItemTransfer => "item_transfer",
            Self::PowerFuse => "power_fuse",
        }
    }
}

impl core::fmt::Display for HookKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Native operations
// ---------------------------------------------------------------------------

/// A distinguishable native operation that can be intercepted.
///
/// Each operation gets at most one installed interception per world
/// session, shared by every object of the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NativeOperation {
    /// `FactoryConnector::grab_output`.
    FactoryGrabOutput,
    /// `FactoryConnector::grab_output_inventory`, called from inside
    /// `grab_output`.
    FactoryGrabOutputInventory,
    /// `PowerCircuit::tick_circuit`.
    PowerTickCircuit,
}

impl NativeOperation {
    /// Symbol-like name of the intercepted operation.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::FactoryGrabOutput => "FactoryConnector::grab_output",
            Self::FactoryGrabOutputInventory => "FactoryConnector::grab_output_inventory",
            Self::PowerTickCircuit => "PowerCircuit::tick_circuit",
        }
    }
}

impl core::fmt::Display for NativeOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Speaker sound events
// ---------------------------------------------------------------------------

/// What happened to a speaker's sound; sent as the first `SpeakerSound`
/// argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEvent {
    /// Playback started.
    Started,
    /// Playback was stopped before the end.
    Stopped,
    /// Playback reached the end of the sound.
    Finished,
}

impl SoundEvent {
    /// Numeric code delivered to scripts.
    pub const fn code(self) -> i64 {
        match self {
            Self::Started => 0,
            Self::Stopped => 1,
            Self::Finished => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_kind_names_are_distinct() {
        let names: std::collections::BTreeSet<_> = HookKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), HookKind::ALL.len());
    }

    #[test]
    fn hook_kind_persists_as_identifier() {
        let json = serde_json::to_string(&HookKind::ItemTransfer).ok();
        assert_eq!(json.as_deref(), Some("\"ItemTransfer\""));
    }

    #[test]
    fn sound_event_codes() {
        assert_eq!(SoundEvent::Started.code(), 0);
        assert_eq!(SoundEvent::Stopped.code(), 1);
        assert_eq!(SoundEvent::Finished.code(), 2);
    }
}

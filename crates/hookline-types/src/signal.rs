//! Signal payloads.
//!
//! A [`Signal`] is a named event with an ordered list of typed arguments.
//! It is immutable after construction and backed by an [`Arc`], so fanning
//! it out to many listeners only bumps a reference count.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Well-known signal names emitted by the built-in hooks and objects.
pub mod names {
    /// A train's self-driving flag changed. Args: `[Bool(enabled)]`.
    pub const SELF_DRIVING_UPDATE: &str = "SelfDrivingUpdate";
    /// A factory connector handed over an item. Args: `[Item(stack)]`.
    pub const ITEM_TRANSFER: &str = "ItemTransfer";
    /// A power circuit's fuse tripped or was reset. No args.
    pub const POWER_FUSE_CHANGED: &str = "PowerFuseChanged";
    /// A speaker started, stopped or finished a sound.
    /// Args: `[Int(code), Str(sound)]`.
    pub const SPEAKER_SOUND: &str = "SpeakerSound";
}

/// A stack of items moving through a factory connector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item descriptor name.
    pub item: String,
    /// Number of items in the stack.
    pub amount: u32,
}

impl ItemStack {
    /// Build a stack of `amount` items of kind `item`.
    pub fn new(item: impl Into<String>, amount: u32) -> Self {
        Self {
            item: item.into(),
            amount,
        }
    }
}

/// A single typed signal argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    /// Boolean argument.
    Bool(bool),
    /// Integer argument.
    Int(i64),
    /// Floating point argument.
    Float(f64),
    /// String argument.
    Str(String),
    /// Item stack argument.
    Item(ItemStack),
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SignalValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SignalValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<ItemStack> for SignalValue {
    fn from(value: ItemStack) -> Self {
        Self::Item(value)
    }
}

#[derive(Debug, PartialEq)]
struct SignalData {
    name: String,
    args: Vec<SignalValue>,
}

/// An immutable named event with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal(Arc<SignalData>);

impl Signal {
    /// Build a signal with the given name and arguments.
    pub fn new(name: impl Into<String>, args: Vec<SignalValue>) -> Self {
        Self(Arc::new(SignalData {
            name: name.into(),
            args,
        }))
    }

    /// Build a signal with no arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// The signal name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The ordered argument list.
    pub fn args(&self) -> &[SignalValue] {
        &self.0.args
    }

    /// Whether two handles share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl core::fmt::Display for Signal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, arg) in self.args().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                SignalValue::Bool(v) => write!(f, "{v}")?,
                SignalValue::Int(v) => write!(f, "{v}")?,
                SignalValue::Float(v) => write!(f, "{v}")?,
                SignalValue::Str(v) => write!(f, "{v:?}")?,
                SignalValue::Item(v) => write!(f, "{}x{}", v.amount, v.item)?,
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_payload() {
        let signal = Signal::new(names::ITEM_TRANSFER, vec![ItemStack::new("iron_plate", 1).into()]);
        let copy = signal.clone();
        assert!(signal.ptr_eq(&copy));
        assert_eq!(copy.name(), "ItemTransfer");
    }

    #[test]
    fn display_lists_args() {
        let signal = Signal::new(names::SPEAKER_SOUND, vec![0_i64.into(), "alarm".into()]);
        assert_eq!(signal.to_string(), "SpeakerSound(0, \"alarm\")");
    }

    #[test]
    fn named_signal_has_no_args() {
        let signal = Signal::named(names::POWER_FUSE_CHANGED);
        assert!(signal.args().is_empty());
    }
}

//! Capability to hook-kind table.
//!
//! The table is filled once when the session starts and then shared
//! read-only. An object's applicable hooks are the union of the kinds
//! registered for each of its capabilities.

use std::collections::{BTreeMap, BTreeSet};

use hookline_types::{Capability, HookKind};

/// Which hook kinds apply to which capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookRegistry {
    table: BTreeMap<Capability, BTreeSet<HookKind>>,
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in hook declared.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(Capability::Train, HookKind::SelfDriving)
            .register(Capability::FactoryConnector, HookKind::ItemTransfer)
            .register(Capability::PowerCircuit, HookKind::PowerFuse);
        registry
    }

    /// Declare that objects with `capability` get hooks of `kind`.
    pub fn register(&mut self, capability: Capability, kind: HookKind) -> &mut Self {
        self.table.entry(capability).or_default().insert(kind);
        self
    }

    /// Hook kinds applicable to an object with the given capabilities.
    pub fn kinds_for(&self, capabilities: &[Capability]) -> BTreeSet<HookKind> {
        capabilities
            .iter()
            .filter_map(|capability| self.table.get(capability))
            .flatten()
            .copied()
            .collect()
    }

    /// Capabilities that have at least one hook kind.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.table.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_hooked_capabilities() {
        let registry = HookRegistry::builtin();
        assert_eq!(
            registry.kinds_for(&[Capability::Train]),
            BTreeSet::from([HookKind::SelfDriving])
        );
        assert_eq!(
            registry.kinds_for(&[Capability::FactoryConnector]),
            BTreeSet::from([HookKind::ItemTransfer])
        );
        assert_eq!(
            registry.kinds_for(&[Capability::PowerCircuit]),
            BTreeSet::from([HookKind::PowerFuse])
        );
    }

    #[test]
    fn speaker_has_no_hooks() {
        let registry = HookRegistry::builtin();
        assert!(registry.kinds_for(&[Capability::Speaker]).is_empty());
    }

    #[test]
    fn multiple_capabilities_union() {
        let registry = HookRegistry::builtin();
        let kinds = registry.kinds_for(&[Capability::Train, Capability::PowerCircuit]);
        assert_eq!(
            kinds,
            BTreeSet::from([HookKind::SelfDriving, HookKind::PowerFuse])
        );
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = HookRegistry::new();
        registry
            .register(Capability::Speaker, HookKind::PowerFuse)
            .register(Capability::Speaker, HookKind::PowerFuse);
        assert_eq!(registry.kinds_for(&[Capability::Speaker]).len(), 1);
        assert_eq!(registry.capabilities().count(), 1);
    }
}

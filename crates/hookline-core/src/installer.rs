//! One-shot interception installation.
//!
//! Every native operation gets at most one handler from the hook subsystem,
//! no matter how many objects or hook instances want it. The first hook
//! that needs an operation installs the shared handler; later callers are
//! no-ops. A failed installation is remembered and logged once, and that
//! operation's hooks simply never fire.
//!
//! Seams belong to the world and outlive any one session, so the installer
//! keeps the handle of every handler it installed and gives them back
//! through [`HookInstaller::drain_installed`] when the session tears down.

use std::collections::BTreeMap;

use hookline_types::NativeOperation;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::seam::{Seam, SeamHandle, SeamHandler};

/// Outcome of the one installation attempt for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// The handler is live in the seam.
    Installed,
    /// The seam refused the handler; the operation produces no events.
    Failed,
}

/// Tracks which native operations have been intercepted this session.
#[derive(Debug, Default)]
pub struct HookInstaller {
    inner: Mutex<Attempts>,
}

#[derive(Debug, Default)]
struct Attempts {
    states: BTreeMap<NativeOperation, InstallState>,
    handles: BTreeMap<NativeOperation, SeamHandle>,
}

impl HookInstaller {
    /// Create an installer with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler built by `make_handler` into `seam`, unless this
    /// operation was already attempted.
    ///
    /// Returns `true` if the operation's interception is live after the
    /// call. `make_handler` only runs for the first attempt.
    pub fn install_once<A, R>(
        &self,
        seam: &Seam<A, R>,
        make_handler: impl FnOnce() -> SeamHandler<A, R>,
    ) -> bool {
        let operation = seam.operation();
        let mut attempts = self.inner.lock();
        if let Some(state) = attempts.states.get(&operation) {
            return *state == InstallState::Installed;
        }

        let state = match seam.install(make_handler()) {
            Ok(handle) => {
                debug!(%operation, "Native operation intercepted");
                attempts.handles.insert(operation, handle);
                InstallState::Installed
            }
            Err(e) => {
                error!(%operation, error = %e, "Failed to intercept native operation; its hooks will never fire");
                InstallState::Failed
            }
        };
        attempts.states.insert(operation, state);
        state == InstallState::Installed
    }

    /// State of the installation attempt for `operation`, if one was made.
    pub fn state(&self, operation: NativeOperation) -> Option<InstallState> {
        self.inner.lock().states.get(&operation).copied()
    }

    /// Whether `operation` is intercepted.
    pub fn is_installed(&self, operation: NativeOperation) -> bool {
        self.state(operation) == Some(InstallState::Installed)
    }

    /// All live interceptions, in operation order.
    pub fn installed_operations(&self) -> Vec<NativeOperation> {
        self.inner
            .lock()
            .states
            .iter()
            .filter(|(_, state)| **state == InstallState::Installed)
            .map(|(operation, _)| *operation)
            .collect()
    }

    /// Take the handles of every live interception, forgetting them.
    ///
    /// The caller is expected to uninstall each handle from its seam. A
    /// drained operation installs again on its next request; failed
    /// attempts stay remembered.
    pub fn drain_installed(&self) -> Vec<(NativeOperation, SeamHandle)> {
        let mut attempts = self.inner.lock();
        let handles = std::mem::take(&mut attempts.handles);
        attempts
            .states
            .retain(|_, state| *state != InstallState::Installed);
        handles.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::seam::NativeCall;

    fn counting_handler(hits: &Arc<AtomicUsize>) -> SeamHandler<u32, u32> {
        let hits = Arc::clone(hits);
        Arc::new(move |call: &mut NativeCall<'_, u32, u32>| {
            hits.fetch_add(1, Ordering::SeqCst);
            let _ = call.proceed();
        })
    }

    #[test]
    fn installs_exactly_once() {
        let installer = HookInstaller::new();
        let seam: Seam<u32, u32> = Seam::new(NativeOperation::PowerTickCircuit);
        let hits = Arc::new(AtomicUsize::new(0));
        let built = AtomicUsize::new(0);

        for _ in 0..5 {
            let live = installer.install_once(&seam, || {
                built.fetch_add(1, Ordering::SeqCst);
                counting_handler(&hits)
            });
            assert!(live);
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(seam.handler_count(), 1);

        let mut arg = 3;
        let _ = seam.call(&mut arg, &|x: &mut u32| *x);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_remembered() {
        let installer = HookInstaller::new();
        let seam: Seam<u32, u32> = Seam::unpatchable(NativeOperation::FactoryGrabOutput);
        let hits = Arc::new(AtomicUsize::new(0));
        let attempts = AtomicUsize::new(0);

        for _ in 0..3 {
            let live = installer.install_once(&seam, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                counting_handler(&hits)
            });
            assert!(!live);
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            installer.state(NativeOperation::FactoryGrabOutput),
            Some(InstallState::Failed)
        );
        assert!(!installer.is_installed(NativeOperation::FactoryGrabOutput));
        assert!(installer.installed_operations().is_empty());
    }

    #[test]
    fn operations_are_tracked_independently() {
        let installer = HookInstaller::new();
        let tick: Seam<u32, u32> = Seam::new(NativeOperation::PowerTickCircuit);
        let grab: Seam<u32, u32> = Seam::new(NativeOperation::FactoryGrabOutput);
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(installer.install_once(&tick, || counting_handler(&hits)));
        assert_eq!(installer.state(NativeOperation::FactoryGrabOutput), None);
        assert!(installer.install_once(&grab, || counting_handler(&hits)));

        assert_eq!(
            installer.installed_operations(),
            vec![
                NativeOperation::FactoryGrabOutput,
                NativeOperation::PowerTickCircuit
            ]
        );
    }

    #[test]
    fn drained_operations_can_be_installed_again() {
        let installer = HookInstaller::new();
        let seam: Seam<u32, u32> = Seam::new(NativeOperation::PowerTickCircuit);
        let broken: Seam<u32, u32> = Seam::unpatchable(NativeOperation::FactoryGrabOutput);
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(installer.install_once(&seam, || counting_handler(&hits)));
        assert!(!installer.install_once(&broken, || counting_handler(&hits)));

        let drained = installer.drain_installed();
        assert_eq!(drained.len(), 1);
        for (operation, handle) in drained {
            assert_eq!(operation, NativeOperation::PowerTickCircuit);
            assert!(seam.uninstall(handle));
        }
        assert_eq!(seam.handler_count(), 0);
        assert!(installer.drain_installed().is_empty());
        assert_eq!(installer.state(NativeOperation::PowerTickCircuit), None);
        assert_eq!(
            installer.state(NativeOperation::FactoryGrabOutput),
            Some(InstallState::Failed)
        );

        assert!(installer.install_once(&seam, || counting_handler(&hits)));
        assert_eq!(seam.handler_count(), 1);
    }
}

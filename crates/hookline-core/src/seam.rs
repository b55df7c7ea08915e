//! Native-call seams.
//!
//! A [`Seam`] stands in for a patched native function. The host routes
//! every call of the operation through [`Seam::call`], passing the
//! arguments and the unpatched native body. Installed handlers see the
//! call as a [`NativeCall`]: they can inspect and mutate the arguments,
//! run the original with [`NativeCall::proceed`], and read its result.
//!
//! Handler lists are snapshotted before dispatch, so a handler may re-enter
//! the same seam (nested native calls) or install further handlers without
//! deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hookline_types::NativeOperation;
use parking_lot::Mutex;

use crate::error::InstallError;

/// A handler installed into a seam.
pub type SeamHandler<A, R> = Arc<dyn Fn(&mut NativeCall<'_, A, R>) + Send + Sync>;

/// One in-flight call of an intercepted operation.
pub struct NativeCall<'a, A, R> {
    args: &'a mut A,
    original: &'a dyn Fn(&mut A) -> R,
    result: Option<R>,
}

impl<'a, A, R> NativeCall<'a, A, R> {
    fn new(args: &'a mut A, original: &'a dyn Fn(&mut A) -> R) -> Self {
        Self {
            args,
            original,
            result: None,
        }
    }

    /// The call's arguments.
    pub fn args(&self) -> &A {
        &*self.args
    }

    /// Mutable access to the call's arguments.
    pub fn args_mut(&mut self) -> &mut A {
        &mut *self.args
    }

    /// Run the original operation and return its result.
    ///
    /// The original runs at most once per call; later calls return the
    /// stored result.
    pub fn proceed(&mut self) -> &R {
        let result = match self.result.take() {
            Some(result) => result,
            None => (self.original)(&mut *self.args),
        };
        self.result.insert(result)
    }

    /// The original's result, once it has run.
    pub const fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Whether the original has run.
    pub const fn has_proceeded(&self) -> bool {
        self.result.is_some()
    }

    fn finish(self) -> R {
        match self.result {
            Some(result) => result,
            None => (self.original)(self.args),
        }
    }
}

/// Identifies one installed handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeamHandle(u64);

/// Interception point for one native operation.
pub struct Seam<A, R> {
    operation: NativeOperation,
    patchable: bool,
    next_handle: AtomicU64,
    handlers: Mutex<Vec<(SeamHandle, SeamHandler<A, R>)>>,
}

impl<A, R> Seam<A, R> {
    /// A seam that accepts interceptions.
    pub fn new(operation: NativeOperation) -> Self {
        Self {
            operation,
            patchable: true,
            next_handle: AtomicU64::new(0),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// A seam whose operation cannot be patched; every install fails.
    pub fn unpatchable(operation: NativeOperation) -> Self {
        Self {
            operation,
            patchable: false,
            next_handle: AtomicU64::new(0),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// The operation this seam intercepts.
    pub const fn operation(&self) -> NativeOperation {
        self.operation
    }

    /// Add a handler that runs on every call.
    pub fn install(&self, handler: SeamHandler<A, R>) -> Result<SeamHandle, InstallError> {
        if !self.patchable {
            return Err(InstallError::Unpatchable {
                operation: self.operation,
            });
        }
        let handle = SeamHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((handle, handler));
        Ok(handle)
    }

    /// Remove a handler added by [`install`](Self::install).
    ///
    /// Returns `false` if it was already gone. Calls already dispatching
    /// keep their snapshot and finish with the handler.
    pub fn uninstall(&self, handle: SeamHandle) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(installed, _)| *installed != handle);
        handlers.len() != before
    }

    /// Number of installed handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Invoke the operation through its installed handlers.
    ///
    /// Handlers run in install order. If none of them proceeded, the
    /// original runs after the last handler.
    pub fn call(&self, args: &mut A, original: &dyn Fn(&mut A) -> R) -> R {
        let handlers: Vec<SeamHandler<A, R>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        if handlers.is_empty() {
            return original(args);
        }

        let mut call = NativeCall::new(args, original);
        for handler in &handlers {
            handler(&mut call);
        }
        call.finish()
    }
}

impl<A, R> core::fmt::Debug for Seam<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Seam")
            .field("operation", &self.operation)
            .field("patchable", &self.patchable)
            .field("handlers", &self.handler_count())
            .finish()
    }
}

//! Error types for the `hookline-core` crate.
//!
//! None of these ever escape a signal emission: delivery and installation
//! failures are logged and isolated where they happen. They surface only
//! from the operations that hand them to the caller (seam installation,
//! a listener's own `deliver`, future submission, snapshot encoding).

use hookline_types::{ListenerId, NativeOperation};

/// Failure to install an interception into a native seam.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The host cannot patch this operation.
    #[error("native operation {operation} cannot be intercepted")]
    Unpatchable {
        /// The operation that refused the interception.
        operation: NativeOperation,
    },
}

/// Failure of a single listener to accept a signal.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The listener's inbound queue is full.
    #[error("signal queue of listener {listener} is full ({capacity} pending)")]
    QueueFull {
        /// The listener that dropped the signal.
        listener: ListenerId,
        /// Its queue capacity.
        capacity: usize,
    },

    /// The listener no longer accepts signals.
    #[error("listener {listener} is closed")]
    Closed {
        /// The closed listener.
        listener: ListenerId,
    },

    /// The listener rejected the signal for its own reasons.
    #[error("listener rejected signal: {message}")]
    Rejected {
        /// Description from the listener.
        message: String,
    },
}

/// Failure to hand a deferred call to the simulation domain.
#[derive(Debug, thiserror::Error)]
pub enum FutureError {
    /// The session that would execute the call has shut down.
    #[error("future queue closed, {task} was not submitted")]
    QueueClosed {
        /// Name of the rejected task.
        task: &'static str,
    },

    /// The session shut down while the call was still queued.
    #[error("{task} was dropped before it ran")]
    Dropped {
        /// Name of the dropped task.
        task: &'static str,
    },
}

/// Failure to encode, decode or store a hook snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// JSON encoding or decoding failed.
    #[error("snapshot serialization error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

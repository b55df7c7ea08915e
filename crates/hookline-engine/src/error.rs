//! Error types for the Hookline engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup, the tick loop, and
//! the scripting task so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hookline_core::config::ConfigError,
    },

    /// Saving or loading hook data failed.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: hookline_core::session::SessionError,
    },

    /// The scripting task could not be joined.
    #[error("script task error: {message}")]
    Script {
        /// Description of the failure.
        message: String,
    },
}

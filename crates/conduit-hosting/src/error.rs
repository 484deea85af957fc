//! Hosting error types.

use conduit_core::BoxError;
use thiserror::Error;

/// Errors reported by a [`ServerFactory`](crate::ServerFactory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerFactoryError {
    /// The factory already holds an entry point and accepts only one.
    #[error("Server factory has already materialized an entry point")]
    AlreadyMaterialized,

    /// The factory could not expose the entry point.
    #[error("Server factory failed: {0}")]
    Failed(String),
}

/// Errors that can occur while starting an application.
#[derive(Error, Debug)]
pub enum HostingError {
    /// No startup is registered under the requested name.
    #[error("Unknown startup: {0}")]
    UnknownStartup(String),

    /// The startup's configuration method failed.
    #[error("Startup '{startup}' failed: {source}")]
    Startup {
        /// Name of the failing startup.
        startup: String,
        /// The error it returned.
        #[source]
        source: BoxError,
    },

    /// The server factory rejected the assembled entry point.
    #[error(transparent)]
    ServerFactory(#[from] ServerFactoryError),
}

/// Result type for hosting operations.
pub type HostingResult<T> = Result<T, HostingError>;

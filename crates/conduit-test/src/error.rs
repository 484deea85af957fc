//! Host and test error types.

use conduit_core::PipelineFault;
use conduit_hosting::{HostingError, LifecycleError};
use thiserror::Error;

/// Errors reported by the test host and its orchestrator.
#[derive(Error, Debug)]
pub enum HostError {
    /// The host was configured with missing or unusable input.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No pipeline has been captured yet.
    #[error("Host is not initialized: no pipeline has been captured")]
    Uninitialized,

    /// The host has already been disposed.
    #[error("Host has been disposed")]
    Disposed,

    /// The orchestrator has already run a configuration.
    #[error("Host is already configured")]
    AlreadyConfigured,

    /// The hosting engine failed to start the application.
    #[error(transparent)]
    EngineStart(#[from] HostingError),

    /// A teardown action failed while the host was disposed.
    #[error(transparent)]
    Teardown(#[from] LifecycleError),

    /// A fault escaped a pipeline that has no safety wrapper.
    #[error("Unhandled pipeline fault: {0}")]
    Unhandled(#[source] PipelineFault),
}

/// Errors that can occur while building requests or reading responses.
#[derive(Error, Debug)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Response body reading failed.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The host rejected the request.
    #[error(transparent)]
    Host(#[from] HostError),
}

//! Pipeline terminal capture.
//!
//! [`PipelineCapture`] stands in for a real server factory. Instead of binding
//! a listener it keeps the entry point handed over by the hosting engine, so
//! the test host can call the pipeline directly.

use crate::error::HostError;
use conduit_core::{PipelineFault, RequestContext};
use conduit_hosting::{LifecycleToken, ServerFactory, ServerFactoryError};
use conduit_middleware::{AppFunc, Properties};
use std::sync::OnceLock;

/// A server factory that captures the assembled entry point in memory.
///
/// The entry point can be set only once. Releasing the token returned by
/// [`materialize`](ServerFactory::materialize) does nothing, since nothing
/// was started.
#[derive(Debug, Default)]
pub struct PipelineCapture {
    entry_point: OnceLock<AppFunc>,
}

impl PipelineCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once an entry point has been captured.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.entry_point.get().is_some()
    }

    /// Returns the captured entry point.
    #[must_use]
    pub fn entry_point(&self) -> Option<&AppFunc> {
        self.entry_point.get()
    }

    /// Runs the captured pipeline against `ctx`.
    ///
    /// Errors returned by the chain come back as [`HostError::Unhandled`].
    /// A chain headed by a safety wrapper never returns one.
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> Result<(), HostError> {
        let entry_point = self.entry_point.get().ok_or(HostError::Uninitialized)?;
        entry_point
            .call(ctx)
            .await
            .map_err(|e| HostError::Unhandled(PipelineFault::Error(e)))
    }
}

impl ServerFactory for PipelineCapture {
    fn materialize(
        &self,
        entry_point: AppFunc,
        properties: &Properties,
    ) -> Result<LifecycleToken, ServerFactoryError> {
        self.entry_point
            .set(entry_point)
            .map_err(|_| ServerFactoryError::AlreadyMaterialized)?;

        tracing::debug!(properties = properties.len(), "Captured pipeline entry point");
        Ok(LifecycleToken::noop())
    }
}

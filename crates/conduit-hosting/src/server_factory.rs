//! The server factory seam.
//!
//! After the builder has assembled the chain, the hosting engine hands the
//! entry point to a [`ServerFactory`] and expects a [`LifecycleToken`] back.
//! A production factory would bind a listener here; test factories keep the
//! entry point in memory instead.

use crate::error::ServerFactoryError;
use crate::lifecycle::LifecycleToken;
use conduit_middleware::{AppFunc, Properties};

/// Exposes a finished pipeline to the outside world.
pub trait ServerFactory: Send + Sync {
    /// Takes ownership of the assembled entry point.
    ///
    /// Called exactly once per start, after every middleware is registered.
    /// The returned token is released when the application is torn down.
    fn materialize(
        &self,
        entry_point: AppFunc,
        properties: &Properties,
    ) -> Result<LifecycleToken, ServerFactoryError>;
}

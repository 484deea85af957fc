//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait every link in a chain
//! implements, and the [`Next`] handle used to continue down the chain.
//!
//! # Example
//!
//! ```
//! use conduit_core::RequestContext;
//! use conduit_middleware::{BoxFuture, Middleware, MiddlewareResult, Next};
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn name(&self) -> &'static str {
//!         "powered_by"
//!     }
//!
//!     fn invoke<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, MiddlewareResult> {
//!         Box::pin(async move {
//!             ctx.response_headers_mut()
//!                 .insert("x-powered-by", "conduit".parse().unwrap());
//!             next.run(ctx).await
//!         })
//!     }
//! }
//! ```

use conduit_core::{BoxError, RequestContext};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The outcome of running a middleware.
///
/// The response itself is written into the [`RequestContext`]; the result
/// only reports whether the middleware failed.
pub type MiddlewareResult = Result<(), BoxError>;

/// A type-erased middleware that can be stored in a chain.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The terminal callable invoked once every middleware has delegated.
pub type Endpoint = Arc<
    dyn for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult> + Send + Sync,
>;

/// Wraps a closure as an [`Endpoint`].
///
/// Passing the closure through this function lets the compiler infer the
/// higher-ranked signature, so the body can simply return `Box::pin(async move { .. })`.
pub fn endpoint_fn<F>(func: F) -> Endpoint
where
    F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(func)
}

/// The core middleware trait.
///
/// A middleware receives the mutable context and a [`Next`] handle. It may
/// transform the context before and after calling `next.run(ctx)`, or skip
/// the call to short-circuit the rest of the chain.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Processes the exchange and optionally delegates to the rest of the chain.
    fn invoke<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult>;
}

/// Handle to the remainder of the chain.
///
/// Consumed by [`Next::run`], so the rest of the chain runs at most once per
/// middleware invocation.
pub struct Next<'a> {
    remaining: &'a [BoxedMiddleware],
    endpoint: &'a Endpoint,
}

impl<'a> Next<'a> {
    /// Creates a handle that runs `remaining` in order, then `endpoint`.
    pub(crate) fn new(remaining: &'a [BoxedMiddleware], endpoint: &'a Endpoint) -> Self {
        Self {
            remaining,
            endpoint,
        }
    }

    /// Returns how many middleware are left before the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Invokes the next middleware, or the endpoint when none are left.
    pub async fn run(self, ctx: &mut RequestContext) -> MiddlewareResult {
        match self.remaining.split_first() {
            Some((head, rest)) => head.invoke(ctx, Next::new(rest, self.endpoint)).await,
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```
/// use conduit_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |ctx, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let result = next.run(ctx).await;
///         ctx.insert("app.Elapsed", started.elapsed());
///         result
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn invoke<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        (self.func)(ctx, next)
    }
}

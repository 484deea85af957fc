//! Application builder and the assembled entry point.
//!
//! An [`AppBuilder`] collects middleware in registration order. Calling
//! [`AppBuilder::build`] freezes the chain into an [`AppFunc`], the single
//! callable that represents the head of the pipeline. The chain cannot be
//! changed after that point.
//!
//! ```text
//! use_middleware(A) → use_middleware(B) → run(endpoint) → build()
//!
//! AppFunc::call(ctx):  A → B → endpoint
//! ```

use crate::middleware::{
    endpoint_fn, BoxFuture, BoxedMiddleware, Endpoint, FnMiddleware, Middleware,
    MiddlewareResult, Next,
};
use conduit_core::{BoxError, RequestContext};
use http::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// String properties shared between the builder, the hosting engine and the
/// server factory.
pub type Properties = BTreeMap<String, String>;

/// A teardown action registered during startup.
///
/// Runs once when the host that started the application is disposed.
pub type TeardownAction = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Builder for a middleware chain.
///
/// Middleware runs in the order it was registered. If no endpoint is set
/// with [`run`](Self::run), requests that pass every middleware get a
/// `404 Not Found`.
///
/// # Example
///
/// ```
/// use conduit_middleware::AppBuilder;
/// use http::StatusCode;
///
/// let mut app = AppBuilder::new();
/// app.use_fn("hello", |ctx, _next| {
///     Box::pin(async move {
///         ctx.set_response_status(StatusCode::OK);
///         ctx.write_body("hello");
///         Ok(())
///     })
/// });
///
/// assert_eq!(app.middleware_names(), vec!["hello"]);
/// let entry_point = app.build();
/// assert_eq!(entry_point.middleware_names(), vec!["hello"]);
/// ```
pub struct AppBuilder {
    middleware: Vec<BoxedMiddleware>,
    endpoint: Option<Endpoint>,
    properties: Properties,
    teardown: Vec<(String, TeardownAction)>,
}

impl AppBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_properties(Properties::new())
    }

    /// Creates an empty builder seeded with properties.
    #[must_use]
    pub fn with_properties(properties: Properties) -> Self {
        Self {
            middleware: Vec::new(),
            endpoint: None,
            properties,
            teardown: Vec::new(),
        }
    }

    /// Appends a middleware to the chain.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        tracing::debug!(
            middleware = middleware.name(),
            position = self.middleware.len(),
            "Registering middleware"
        );
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a closure-based middleware to the chain.
    pub fn use_fn<F>(&mut self, name: &'static str, func: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(FnMiddleware::new(name, func))
    }

    /// Sets the terminal endpoint invoked after the last middleware.
    ///
    /// Replaces any previously set endpoint.
    pub fn run<F>(&mut self, func: F) -> &mut Self
    where
        F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult>
            + Send
            + Sync
            + 'static,
    {
        self.endpoint = Some(endpoint_fn(func));
        self
    }

    /// Returns the names of the registered middleware, in order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Returns the builder properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the builder properties for modification.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Returns a single property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Registers an action to run when the host is disposed.
    ///
    /// Actions run in reverse registration order.
    pub fn on_disposing<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.teardown.push((name.into(), Box::new(action)));
        self
    }

    /// Removes and returns the registered teardown actions.
    pub fn take_teardown_actions(&mut self) -> Vec<(String, TeardownAction)> {
        std::mem::take(&mut self.teardown)
    }

    /// Freezes the chain into its entry point.
    #[must_use]
    pub fn build(self) -> AppFunc {
        let endpoint = self.endpoint.unwrap_or_else(not_found_endpoint);
        AppFunc {
            chain: Arc::new(Chain {
                middleware: self.middleware,
                endpoint,
            }),
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("middleware", &self.middleware_names())
            .field("has_endpoint", &self.endpoint.is_some())
            .field("properties", &self.properties)
            .field("teardown_actions", &self.teardown.len())
            .finish()
    }
}

fn not_found_endpoint() -> Endpoint {
    endpoint_fn(|ctx| {
        Box::pin(async move {
            ctx.set_response_status(StatusCode::NOT_FOUND);
            Ok(())
        })
    })
}

struct Chain {
    middleware: Vec<BoxedMiddleware>,
    endpoint: Endpoint,
}

/// The entry point of an assembled pipeline.
///
/// Cheap to clone; clones share the same chain.
#[derive(Clone)]
pub struct AppFunc {
    chain: Arc<Chain>,
}

impl AppFunc {
    /// Creates an entry point that runs `func` with no middleware in front.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            chain: Arc::new(Chain {
                middleware: Vec::new(),
                endpoint: endpoint_fn(func),
            }),
        }
    }

    /// Runs the whole chain against `ctx`.
    pub fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(Next::new(&self.chain.middleware, &self.chain.endpoint).run(ctx))
    }

    /// Returns the names of the middleware in the chain, head first.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain.middleware.iter().map(|mw| mw.name()).collect()
    }

    /// Returns true if both entry points share the same chain.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.chain, &other.chain)
    }
}

impl fmt::Debug for AppFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppFunc")
            .field("middleware", &self.middleware_names())
            .finish()
    }
}

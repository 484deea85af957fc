//! # Conduit Middleware
//!
//! Middleware chain construction for the Conduit in-process test host.
//!
//! This crate provides the pieces a hosting engine needs to assemble a
//! pipeline:
//!
//! - [`Middleware`] and [`Next`]: one link of the chain and the handle to the
//!   rest of it
//! - [`AppBuilder`]: registers middleware in call order and freezes them into
//!   an [`AppFunc`] entry point
//! - [`SafetyWrapper`]: the fault boundary placed at the head of a chain, with
//!   pluggable [`FaultTranslator`]s
//!
//! ## Example
//!
//! ```
//! use conduit_core::RequestContext;
//! use conduit_middleware::{AppBuilder, SafetyWrapper};
//! use http::StatusCode;
//!
//! # tokio_test::block_on(async {
//! let mut app = AppBuilder::new();
//! app.use_middleware(SafetyWrapper::new());
//! app.run(|ctx| {
//!     Box::pin(async move {
//!         let path = ctx.request_path().to_string();
//!         ctx.write_body(path);
//!         Ok(())
//!     })
//! });
//! let entry_point = app.build();
//!
//! let mut ctx = RequestContext::new();
//! ctx.set_request_path("/ping");
//! entry_point.call(&mut ctx).await.unwrap();
//!
//! assert_eq!(ctx.response_status(), StatusCode::OK);
//! assert_eq!(ctx.response_body(), b"/ping");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod middleware;
pub mod safety;

pub use builder::{AppBuilder, AppFunc, Properties, TeardownAction};
pub use middleware::{
    endpoint_fn, BoxFuture, BoxedMiddleware, Endpoint, FnMiddleware, Middleware,
    MiddlewareResult, Next,
};
pub use safety::{FaultTranslator, JsonFaultTranslator, PlainTextFaultTranslator, SafetyWrapper};

//! # Conduit Test
//!
//! An in-process test host for Conduit middleware pipelines.
//!
//! A [`TestHost`] runs an application's real startup through a hosting
//! engine, but swaps the server factory for a [`PipelineCapture`] that keeps
//! the assembled entry point in memory. Requests are then dispatched straight
//! into the pipeline: no listener, no port, no network.
//!
//! ## Key Features
//!
//! - **Same startup as production**: the hosting engine, builder properties
//!   and teardown actions behave exactly as they would behind a server
//! - **Safety wrapper**: callback-configured hosts turn downstream errors and
//!   panics into a `500` response instead of failing the dispatch
//! - **Explicit lifecycle**: [`TestHost::dispose`] runs teardown once; later
//!   dispatches fail with [`HostError::Disposed`]
//! - **Request helpers**: fluent request building and response assertions
//!
//! ## Example
//!
//! ```
//! use conduit_middleware::AppBuilder;
//! use conduit_test::TestHost;
//! use http::StatusCode;
//!
//! # tokio_test::block_on(async {
//! let host = TestHost::from_fn(|app: &mut AppBuilder| {
//!     app.use_fn("fails_on_boom", |ctx, next| {
//!         Box::pin(async move {
//!             if ctx.request_path() == "/boom" {
//!                 return Err("boom".into());
//!             }
//!             next.run(ctx).await
//!         })
//!     });
//!     app.run(|ctx| {
//!         Box::pin(async move {
//!             ctx.write_body("pong");
//!             Ok(())
//!         })
//!     });
//! })
//! .unwrap();
//!
//! host.get("/ping").send().await.assert_body_eq("pong");
//! host.get("/boom")
//!     .send()
//!     .await
//!     .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
//!
//! host.dispose().unwrap();
//! # });
//! ```
//!
//! ## Startup paths
//!
//! | Constructor | Safety wrapper | Faults reach the caller as |
//! |-------------|----------------|----------------------------|
//! | [`TestHost::from_fn`] | Yes | A translated `500` response |
//! | [`TestHost::from_startup`] | No | [`HostError::Unhandled`] |

#![doc(html_root_url = "https://docs.rs/conduit-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod capture;
mod client;
mod error;
mod host;
mod orchestrator;
mod request;
mod response;

pub use capture::PipelineCapture;
pub use client::TestClientRequest;
pub use error::{HostError, TestError};
pub use host::{TestHost, TestHostBuilder};
pub use orchestrator::Orchestrator;
pub use request::TestRequest;
pub use response::TestResponse;

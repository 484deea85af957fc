//! # Conduit Core
//!
//! Shared types for the Conduit in-process test host.
//!
//! This crate defines the unit of data that flows through every pipeline, the
//! [`RequestContext`], together with the fault type raised when a middleware
//! fails. Everything else in the workspace builds on these two pieces.
//!
//! ## Request Context
//!
//! A context is a mutable mapping from string keys to typed values. The
//! well-known keys (method, path, headers, response status, ...) live in the
//! [`keys`] module; hosts and middleware are free to add their own slots.
//!
//! ```
//! use conduit_core::{keys, RequestContext};
//! use http::StatusCode;
//!
//! let mut ctx = RequestContext::new();
//! ctx.set_request_path("/ping");
//! ctx.set_response_status(StatusCode::CREATED);
//! ctx.insert("app.Tenant", String::from("acme"));
//!
//! assert_eq!(ctx.request_path(), "/ping");
//! assert_eq!(ctx.response_status(), StatusCode::CREATED);
//! assert_eq!(ctx.get::<String>("app.Tenant").unwrap(), "acme");
//! assert!(ctx.contains_key(keys::REQUEST_ID));
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod keys;

pub use context::{RequestContext, RequestId};
pub use error::{BoxError, PipelineFault};

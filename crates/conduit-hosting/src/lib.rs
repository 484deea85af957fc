//! # Conduit Hosting
//!
//! The hosting engine behind the Conduit test host.
//!
//! Starting an application means running its configuration once, freezing
//! the resulting middleware chain, and handing the entry point to a
//! [`ServerFactory`]. The engine returns a [`LifecycleToken`] that tears
//! everything down when released.
//!
//! ## Startup sources
//!
//! | Source | Description |
//! |--------|-------------|
//! | [`StartupSource::Callback`] | A closure configures the builder directly |
//! | [`StartupSource::Type`] | A [`Startup`] type is instantiated and configures the builder |
//! | [`StartupSource::Named`] | A startup type registered in the engine's [`StartupRegistry`] |
//!
//! ## Options
//!
//! [`StartOptions`] names the application and carries opaque settings. The
//! settings become builder properties alongside the derived application name
//! (under [`conduit_core::keys::HOST_APP_NAME`]).

#![doc(html_root_url = "https://docs.rs/conduit-hosting/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod options;
pub mod server_factory;
pub mod startup;

pub use engine::{ConfigureFn, DefaultHostingEngine, HostingEngine, StartContext, StartupSource};
pub use error::{HostingError, HostingResult, ServerFactoryError};
pub use lifecycle::{LifecycleError, LifecycleResult, LifecycleToken};
pub use options::{OptionsError, StartOptions};
pub use server_factory::ServerFactory;
pub use startup::{Startup, StartupRef, StartupRegistry};

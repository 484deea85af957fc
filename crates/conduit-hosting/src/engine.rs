//! The hosting engine.
//!
//! The engine runs an application's one-time startup sequence:
//!
//! 1. Resolve the startup source (closure, startup type, or registered name)
//! 2. Seed an [`AppBuilder`] with the option settings, any extra option
//!    fields and the app name
//! 3. Let the startup configure the builder
//! 4. Freeze the chain and hand it to the [`ServerFactory`]
//! 5. Return a [`LifecycleToken`] owning the teardown actions and the
//!    factory's token
//!
//! The engine never touches the network itself; what "serving" means is
//! entirely up to the server factory.

use crate::error::{HostingError, HostingResult};
use crate::lifecycle::LifecycleToken;
use crate::options::StartOptions;
use crate::server_factory::ServerFactory;
use crate::startup::{Startup, StartupRef, StartupRegistry};
use conduit_core::keys;
use conduit_middleware::AppBuilder;
use std::fmt;
use std::sync::Arc;

/// A configuration closure applied to the builder.
pub type ConfigureFn = Arc<dyn Fn(&mut AppBuilder) + Send + Sync>;

/// Where the application's configuration comes from.
#[derive(Clone)]
pub enum StartupSource {
    /// A closure configures the builder directly.
    Callback(ConfigureFn),
    /// A startup type is instantiated and configures the builder.
    Type(StartupRef),
    /// A startup type registered with the engine under this name.
    Named(String),
}

impl StartupSource {
    /// Returns a human-readable description used for logs and default names.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Callback(_) => "callback".to_string(),
            Self::Type(startup) => startup.name().to_string(),
            Self::Named(name) => name.clone(),
        }
    }
}

impl fmt::Debug for StartupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback"),
            Self::Type(startup) => f.debug_tuple("Type").field(startup).finish(),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Everything the engine needs to start one application.
pub struct StartContext {
    /// The configuration source.
    pub startup: StartupSource,
    /// Startup options.
    pub options: StartOptions,
    /// Receives the assembled entry point.
    pub server_factory: Arc<dyn ServerFactory>,
}

impl fmt::Debug for StartContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartContext")
            .field("startup", &self.startup)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Runs an application's startup sequence.
pub trait HostingEngine: Send + Sync {
    /// Starts the application described by `context`.
    ///
    /// Called exactly once per host. The returned token tears the application
    /// down when released.
    fn start(&self, context: StartContext) -> HostingResult<LifecycleToken>;
}

/// The built-in hosting engine.
///
/// # Example
///
/// ```
/// use conduit_hosting::{DefaultHostingEngine, HostingEngine, StartContext, StartOptions, StartupSource};
/// # use conduit_hosting::{LifecycleToken, ServerFactory, ServerFactoryError};
/// # use conduit_middleware::{AppFunc, Properties};
/// # use std::sync::Arc;
/// # struct Discard;
/// # impl ServerFactory for Discard {
/// #     fn materialize(&self, _: AppFunc, _: &Properties) -> Result<LifecycleToken, ServerFactoryError> {
/// #         Ok(LifecycleToken::noop())
/// #     }
/// # }
///
/// let engine = DefaultHostingEngine::new();
/// let token = engine
///     .start(StartContext {
///         startup: StartupSource::Callback(Arc::new(|app| {
///             app.use_fn("noop", |ctx, next| Box::pin(next.run(ctx)));
///         })),
///         options: StartOptions::new().with_app_startup("demo"),
///         server_factory: Arc::new(Discard),
///     })
///     .unwrap();
///
/// assert_eq!(token.name(), "demo");
/// ```
#[derive(Debug, Default)]
pub struct DefaultHostingEngine {
    registry: StartupRegistry,
}

impl DefaultHostingEngine {
    /// Creates an engine with an empty startup registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine using an existing registry.
    #[must_use]
    pub fn with_registry(registry: StartupRegistry) -> Self {
        Self { registry }
    }

    /// Registers a startup type addressable by `name`.
    pub fn register_startup<T: Startup + Default>(&self, name: impl Into<String>) -> &Self {
        self.registry.register::<T>(name);
        self
    }

    /// Returns the startup registry.
    #[must_use]
    pub fn registry(&self) -> &StartupRegistry {
        &self.registry
    }

    fn configure(&self, startup: &StartupSource, app: &mut AppBuilder) -> HostingResult<()> {
        let startup = match startup {
            StartupSource::Callback(configure) => {
                configure(app);
                return Ok(());
            }
            StartupSource::Type(startup) => startup.clone(),
            StartupSource::Named(name) => self
                .registry
                .resolve(name)
                .ok_or_else(|| HostingError::UnknownStartup(name.clone()))?,
        };

        startup
            .instantiate()
            .configuration(app)
            .map_err(|source| HostingError::Startup {
                startup: startup.name().to_string(),
                source,
            })
    }
}

impl HostingEngine for DefaultHostingEngine {
    fn start(&self, context: StartContext) -> HostingResult<LifecycleToken> {
        let StartContext {
            startup,
            options,
            server_factory,
        } = context;

        let app_name = options
            .app_startup()
            .map_or_else(|| startup.describe(), str::to_string);
        tracing::debug!(app = %app_name, startup = ?startup, "Starting application");

        let mut properties = options.properties();
        properties.insert(keys::HOST_APP_NAME.to_string(), app_name.clone());
        let mut app = AppBuilder::with_properties(properties);

        if let Err(e) = self.configure(&startup, &mut app) {
            tracing::error!(app = %app_name, error = %e, "Application configuration failed");
            return Err(e);
        }

        // Owns the teardown actions from here on, so a failing factory still
        // runs them when the token drops.
        let token = LifecycleToken::new(app_name.clone()).with_actions(app.take_teardown_actions());
        let properties = app.properties().clone();
        let entry_point = app.build();
        tracing::debug!(
            app = %app_name,
            middleware = ?entry_point.middleware_names(),
            "Pipeline assembled"
        );

        let server = server_factory.materialize(entry_point, &properties)?;
        tracing::info!(app = %app_name, "Application started");

        Ok(token.attach(server))
    }
}

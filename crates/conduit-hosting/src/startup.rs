//! Startup types and their registry.
//!
//! A startup type is the alternative to a configuration closure: a value that
//! knows how to configure an [`AppBuilder`]. The engine instantiates it from a
//! [`StartupRef`], either passed directly or looked up by name in a
//! [`StartupRegistry`].

use conduit_core::BoxError;
use conduit_middleware::AppBuilder;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An application startup type.
///
/// # Example
///
/// ```
/// use conduit_core::BoxError;
/// use conduit_hosting::Startup;
/// use conduit_middleware::AppBuilder;
///
/// #[derive(Default)]
/// struct HealthApp;
///
/// impl Startup for HealthApp {
///     fn configuration(&self, app: &mut AppBuilder) -> Result<(), BoxError> {
///         app.run(|ctx| {
///             Box::pin(async move {
///                 ctx.write_body("healthy");
///                 Ok(())
///             })
///         });
///         Ok(())
///     }
/// }
/// ```
pub trait Startup: Send + Sync + 'static {
    /// Registers the application's middleware on `app`.
    fn configuration(&self, app: &mut AppBuilder) -> Result<(), BoxError>;
}

/// A reference to a startup type that can be instantiated on demand.
#[derive(Clone)]
pub struct StartupRef {
    name: String,
    factory: Arc<dyn Fn() -> Box<dyn Startup> + Send + Sync>,
}

impl StartupRef {
    /// Refers to `T`, named after its type path.
    #[must_use]
    pub fn of<T: Startup + Default>() -> Self {
        Self {
            name: std::any::type_name::<T>().to_string(),
            factory: Arc::new(|| Box::new(T::default()) as Box<dyn Startup>),
        }
    }

    /// Refers to a startup produced by `factory`.
    pub fn from_fn<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Startup> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Returns the startup name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a fresh startup instance.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Startup> {
        (self.factory)()
    }
}

impl fmt::Debug for StartupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Startup types addressable by name.
#[derive(Debug, Default)]
pub struct StartupRegistry {
    entries: RwLock<HashMap<String, StartupRef>>,
}

impl StartupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under `name`, replacing any previous entry.
    pub fn register<T: Startup + Default>(&self, name: impl Into<String>) {
        self.register_ref(name, StartupRef::of::<T>());
    }

    /// Registers an existing reference under `name`.
    pub fn register_ref(&self, name: impl Into<String>, startup: StartupRef) {
        let name = name.into();
        tracing::debug!(startup = %name, target_type = startup.name(), "Registering startup");
        self.entries.write().insert(name, startup);
    }

    /// Looks up a startup by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<StartupRef> {
        self.entries.read().get(name).cloned()
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Empty;

    impl Startup for Empty {
        fn configuration(&self, _app: &mut AppBuilder) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Tagged;

    impl Startup for Tagged {
        fn configuration(&self, app: &mut AppBuilder) -> Result<(), BoxError> {
            app.use_fn("tag", |ctx, next| Box::pin(next.run(ctx)));
            Ok(())
        }
    }

    #[test]
    fn test_startup_ref_uses_type_name() {
        let startup = StartupRef::of::<Empty>();
        assert!(startup.name().ends_with("Empty"));
    }

    #[test]
    fn test_instantiate_runs_configuration() {
        let startup = StartupRef::of::<Tagged>();
        let mut app = AppBuilder::new();
        startup.instantiate().configuration(&mut app).unwrap();
        assert_eq!(app.middleware_names(), vec!["tag"]);
    }

    #[test]
    fn test_registry_resolves_by_name() {
        let registry = StartupRegistry::new();
        registry.register::<Empty>("empty");
        registry.register_ref("tagged", StartupRef::from_fn("custom", || Box::new(Tagged)));

        assert_eq!(registry.names(), vec!["empty", "tagged"]);
        assert_eq!(registry.resolve("tagged").unwrap().name(), "custom");
        assert!(registry.resolve("missing").is_none());
    }
}

//! Configuration orchestrator.
//!
//! The orchestrator drives a hosting engine exactly once, with a
//! [`PipelineCapture`] as the server factory, and turns the result into a
//! [`TestHost`].
//!
//! There are two ways to configure an application:
//!
//! - **Callback**: a closure configures the builder. The orchestrator puts a
//!   [`SafetyWrapper`] at the head of the chain before the closure runs, so
//!   no fault escapes a dispatch call.
//! - **Startup type**: a [`Startup`] implementation (or a name registered
//!   with the engine) configures the builder. No safety wrapper is added;
//!   faults reach the caller as [`HostError::Unhandled`].

use crate::capture::PipelineCapture;
use crate::error::HostError;
use crate::host::TestHost;
use conduit_hosting::{
    ConfigureFn, DefaultHostingEngine, HostingEngine, LifecycleToken, StartContext, StartOptions,
    Startup, StartupRef, StartupSource,
};
use conduit_middleware::{AppBuilder, FaultTranslator, JsonFaultTranslator, SafetyWrapper};
use std::fmt;
use std::sync::Arc;

/// Runs one application configuration through a hosting engine.
///
/// # Example
///
/// ```
/// use conduit_hosting::DefaultHostingEngine;
/// use conduit_middleware::JsonFaultTranslator;
/// use conduit_test::Orchestrator;
/// use std::sync::Arc;
///
/// let mut orchestrator = Orchestrator::new(
///     Arc::new(DefaultHostingEngine::new()),
///     Arc::new(JsonFaultTranslator::new()),
/// )
/// .label("orders");
///
/// orchestrator
///     .configure_with_callback(
///         Some(|app: &mut conduit_middleware::AppBuilder| {
///             app.run(|_ctx| Box::pin(async { Ok(()) }));
///         }),
///         None,
///     )
///     .unwrap();
///
/// let host = orchestrator.into_host().unwrap();
/// assert_eq!(host.app_name(), "orders");
/// ```
pub struct Orchestrator {
    engine: Arc<dyn HostingEngine>,
    translator: Arc<dyn FaultTranslator>,
    label: Option<String>,
    capture: Arc<PipelineCapture>,
    configured: bool,
    started: Option<(String, LifecycleToken)>,
}

impl Orchestrator {
    /// Creates an orchestrator driving `engine`.
    ///
    /// `translator` renders faults caught by the safety wrapper on the
    /// callback path.
    pub fn new(engine: Arc<dyn HostingEngine>, translator: Arc<dyn FaultTranslator>) -> Self {
        Self {
            engine,
            translator,
            label: None,
            capture: Arc::new(PipelineCapture::new()),
            configured: false,
            started: None,
        }
    }

    /// Sets the name used when the options leave `app_startup` blank.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Configures the application with a closure.
    ///
    /// Fails with [`HostError::InvalidConfiguration`] if `configure` is
    /// `None`; the engine is not called in that case.
    pub fn configure_with_callback<F>(
        &mut self,
        configure: Option<F>,
        options: Option<StartOptions>,
    ) -> Result<(), HostError>
    where
        F: Fn(&mut AppBuilder) + Send + Sync + 'static,
    {
        self.ensure_unconfigured()?;
        let configure = configure.ok_or_else(|| {
            HostError::InvalidConfiguration("a configuration callback is required".to_string())
        })?;
        self.configure_callback(Arc::new(configure), std::any::type_name::<F>(), options)
    }

    /// Configures the application with the startup type `T`.
    pub fn configure_with_startup<T: Startup + Default>(
        &mut self,
        options: Option<StartOptions>,
    ) -> Result<(), HostError> {
        self.ensure_unconfigured()?;
        self.configure_startup(StartupRef::of::<T>(), options)
    }

    /// Configures the application with a startup registered under `name`
    /// in the engine's registry.
    pub fn configure_with_startup_name(
        &mut self,
        name: impl Into<String>,
        options: Option<StartOptions>,
    ) -> Result<(), HostError> {
        self.ensure_unconfigured()?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HostError::InvalidConfiguration(
                "startup name must not be blank".to_string(),
            ));
        }
        let options = self.named_options(options, &name);
        self.start(StartupSource::Named(name), options)
    }

    /// Returns true once a configuration call has been made.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Produces the host handle.
    ///
    /// Fails with [`HostError::Uninitialized`] unless a configuration call
    /// succeeded.
    pub fn into_host(self) -> Result<TestHost, HostError> {
        let (app_name, token) = self.started.ok_or(HostError::Uninitialized)?;
        Ok(TestHost::new(self.capture, token, app_name))
    }

    pub(crate) fn configure_callback(
        &mut self,
        configure: ConfigureFn,
        type_name: &str,
        options: Option<StartOptions>,
    ) -> Result<(), HostError> {
        let options = self.named_options(options, type_name);
        let translator = Arc::clone(&self.translator);

        let adapter: ConfigureFn = Arc::new(move |app: &mut AppBuilder| {
            app.use_middleware(SafetyWrapper::with_translator(Arc::clone(&translator)));
            configure(app);
        });

        self.start(StartupSource::Callback(adapter), options)
    }

    pub(crate) fn configure_startup(
        &mut self,
        startup: StartupRef,
        options: Option<StartOptions>,
    ) -> Result<(), HostError> {
        let options = self.named_options(options, startup.name());
        self.start(StartupSource::Type(startup), options)
    }

    pub(crate) fn ensure_unconfigured(&self) -> Result<(), HostError> {
        if self.configured {
            return Err(HostError::AlreadyConfigured);
        }
        Ok(())
    }

    /// Fills a blank `app_startup` from the label, or else from `fallback`.
    fn named_options(&self, options: Option<StartOptions>, fallback: &str) -> StartOptions {
        let options = options.unwrap_or_default();
        if options.app_startup().is_some() {
            return options;
        }
        let name = self.label.as_deref().unwrap_or(fallback).to_string();
        options.with_app_startup(name)
    }

    fn start(&mut self, startup: StartupSource, options: StartOptions) -> Result<(), HostError> {
        self.ensure_unconfigured()?;
        self.configured = true;

        let app_name = options.app_startup().unwrap_or_default().to_string();
        tracing::debug!(app = %app_name, startup = %startup.describe(), "Configuring test host");

        let server_factory = Arc::clone(&self.capture);
        let token = self.engine.start(StartContext {
            startup,
            options,
            server_factory,
        })?;

        tracing::info!(app = %app_name, "Test host started");
        self.started = Some((app_name, token));
        Ok(())
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(
            Arc::new(DefaultHostingEngine::new()),
            Arc::new(JsonFaultTranslator::new()),
        )
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("label", &self.label)
            .field("configured", &self.configured)
            .field("started", &self.started.as_ref().map(|(name, _)| name))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{BoxError, RequestContext};
    use conduit_hosting::HostingResult;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts start calls and delegates to the default engine.
    #[derive(Default)]
    struct CountingEngine {
        starts: AtomicUsize,
        inner: DefaultHostingEngine,
    }

    impl HostingEngine for CountingEngine {
        fn start(&self, context: StartContext) -> HostingResult<LifecycleToken> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.inner.start(context)
        }
    }

    #[derive(Default)]
    struct Failing;

    impl Startup for Failing {
        fn configuration(&self, app: &mut AppBuilder) -> Result<(), BoxError> {
            app.run(|_ctx| Box::pin(async { Err(BoxError::from("handler failed")) }));
            Ok(())
        }
    }

    fn orchestrator(engine: &Arc<CountingEngine>) -> Orchestrator {
        Orchestrator::new(engine.clone(), Arc::new(JsonFaultTranslator::new()))
    }

    fn noop(app: &mut AppBuilder) {
        app.run(|_ctx| Box::pin(async { Ok(()) }));
    }

    #[test]
    fn test_missing_callback_never_reaches_engine() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);

        let err = orchestrator
            .configure_with_callback(None::<fn(&mut AppBuilder)>, None)
            .unwrap_err();

        assert!(matches!(err, HostError::InvalidConfiguration(_)));
        assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
        assert!(!orchestrator.is_configured());
        assert!(matches!(orchestrator.into_host(), Err(HostError::Uninitialized)));
    }

    #[test]
    fn test_second_configuration_is_rejected() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);

        orchestrator.configure_with_callback(Some(noop), None).unwrap();
        let err = orchestrator
            .configure_with_startup::<Failing>(None)
            .unwrap_err();

        assert!(matches!(err, HostError::AlreadyConfigured));
        assert_eq!(engine.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_path_heads_chain_with_safety_wrapper() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);

        orchestrator
            .configure_with_callback(
                Some(|app: &mut AppBuilder| {
                    app.use_fn("first", |ctx, next| Box::pin(next.run(ctx)));
                }),
                None,
            )
            .unwrap();

        let host = orchestrator.into_host().unwrap();
        let entry_point = host.capture().entry_point().unwrap();
        assert_eq!(entry_point.middleware_names(), vec!["safety_wrapper", "first"]);
    }

    #[test]
    fn test_app_name_from_label_then_type_name() {
        let engine = Arc::new(CountingEngine::default());

        let mut labelled = orchestrator(&engine).label("billing");
        labelled.configure_with_callback(Some(noop), None).unwrap();
        assert_eq!(labelled.into_host().unwrap().app_name(), "billing");

        let mut unlabelled = orchestrator(&engine);
        unlabelled
            .configure_with_startup::<Failing>(None)
            .unwrap();
        assert!(unlabelled.into_host().unwrap().app_name().ends_with("Failing"));

        let mut explicit = orchestrator(&engine).label("ignored");
        explicit
            .configure_with_callback(Some(noop), Some(StartOptions::new().with_app_startup("api")))
            .unwrap();
        assert_eq!(explicit.into_host().unwrap().app_name(), "api");
    }

    #[tokio::test]
    async fn test_startup_path_has_no_safety_wrapper() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);
        orchestrator.configure_with_startup::<Failing>(None).unwrap();

        let host = orchestrator.into_host().unwrap();
        let mut ctx = RequestContext::new();
        let err = host.dispatch(&mut ctx).await.unwrap_err();

        assert!(matches!(err, HostError::Unhandled(_)));
        assert_eq!(ctx.response_status(), StatusCode::OK);
    }

    #[test]
    fn test_unknown_startup_name_is_engine_failure() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);

        let err = orchestrator
            .configure_with_startup_name("missing", None)
            .unwrap_err();

        assert!(matches!(err, HostError::EngineStart(_)));
        assert_eq!(err.to_string(), "Unknown startup: missing");
        assert!(orchestrator.is_configured());
    }

    #[test]
    fn test_registered_startup_name_resolves() {
        let engine = Arc::new(CountingEngine::default());
        engine.inner.register_startup::<Failing>("failing");
        let mut orchestrator = orchestrator(&engine);

        orchestrator
            .configure_with_startup_name("failing", None)
            .unwrap();

        assert_eq!(orchestrator.into_host().unwrap().app_name(), "failing");
    }

    #[test]
    fn test_blank_startup_name_is_invalid() {
        let engine = Arc::new(CountingEngine::default());
        let mut orchestrator = orchestrator(&engine);

        let err = orchestrator
            .configure_with_startup_name("  ", None)
            .unwrap_err();

        assert!(matches!(err, HostError::InvalidConfiguration(_)));
        assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
    }
}

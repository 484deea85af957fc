//! The test host handle.

use crate::capture::PipelineCapture;
use crate::error::HostError;
use crate::orchestrator::Orchestrator;
use bytes::Bytes;
use conduit_core::RequestContext;
use conduit_hosting::{
    ConfigureFn, DefaultHostingEngine, HostingEngine, LifecycleToken, StartOptions, Startup,
    StartupRef,
};
use conduit_middleware::{AppBuilder, FaultTranslator, JsonFaultTranslator};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A started application that is driven by calling its pipeline directly.
///
/// No listener is bound and no port is used: [`dispatch`](Self::dispatch)
/// runs the captured entry point against a [`RequestContext`] in the current
/// task.
///
/// The host owns the application's lifecycle token. [`dispose`](Self::dispose)
/// releases it; a host dropped without being disposed releases it on drop.
///
/// # Example
///
/// ```
/// use conduit_core::RequestContext;
/// use conduit_middleware::AppBuilder;
/// use conduit_test::TestHost;
///
/// # tokio_test::block_on(async {
/// let host = TestHost::from_fn(|app: &mut AppBuilder| {
///     app.run(|ctx| {
///         Box::pin(async move {
///             let path = ctx.request_path().to_string();
///             ctx.write_body(path);
///             Ok(())
///         })
///     });
/// })
/// .unwrap();
///
/// let mut ctx = RequestContext::new();
/// ctx.set_request_path("/ping");
/// host.dispatch(&mut ctx).await.unwrap();
/// assert_eq!(ctx.response_body(), b"/ping");
///
/// host.dispose().unwrap();
/// # });
/// ```
pub struct TestHost {
    capture: Arc<PipelineCapture>,
    token: Mutex<Option<LifecycleToken>>,
    disposed: AtomicBool,
    app_name: String,
}

impl TestHost {
    pub(crate) fn new(
        capture: Arc<PipelineCapture>,
        token: LifecycleToken,
        app_name: String,
    ) -> Self {
        Self {
            capture,
            token: Mutex::new(Some(token)),
            disposed: AtomicBool::new(false),
            app_name,
        }
    }

    /// Starts a host configured by `configure`, behind a safety wrapper.
    pub fn from_fn<F>(configure: F) -> Result<Self, HostError>
    where
        F: Fn(&mut AppBuilder) + Send + Sync + 'static,
    {
        Self::builder().configure(configure).build()
    }

    /// Starts a host configured by `configure` with explicit options.
    pub fn from_fn_with<F>(configure: F, options: StartOptions) -> Result<Self, HostError>
    where
        F: Fn(&mut AppBuilder) + Send + Sync + 'static,
    {
        Self::builder().configure(configure).options(options).build()
    }

    /// Starts a host configured by the startup type `T`.
    ///
    /// No safety wrapper is added; faults surface as
    /// [`HostError::Unhandled`].
    pub fn from_startup<T: Startup + Default>() -> Result<Self, HostError> {
        Self::builder().startup::<T>().build()
    }

    /// Starts a host configured by the startup type `T` with explicit options.
    pub fn from_startup_with<T: Startup + Default>(
        options: StartOptions,
    ) -> Result<Self, HostError> {
        Self::builder().startup::<T>().options(options).build()
    }

    /// Returns a builder for injecting an engine, translator or label.
    pub fn builder() -> TestHostBuilder {
        TestHostBuilder::default()
    }

    /// Runs the pipeline against `ctx`.
    ///
    /// Fails with [`HostError::Disposed`] once the host has been disposed.
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> Result<(), HostError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(HostError::Disposed);
        }
        self.capture.dispatch(ctx).await
    }

    /// Runs a buffered HTTP request through the pipeline.
    pub async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, HostError> {
        let mut ctx = RequestContext::from_request(request);
        self.dispatch(&mut ctx).await?;
        Ok(ctx.into_response())
    }

    /// Disposes the host and runs the application's teardown.
    ///
    /// Teardown runs exactly once. Calling this again fails with
    /// [`HostError::Disposed`].
    pub fn dispose(&self) -> Result<(), HostError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(HostError::Disposed);
        }

        let token = self.token.lock().take();
        if let Some(token) = token {
            token.release()?;
        }

        tracing::info!(app = %self.app_name, "Test host disposed");
        Ok(())
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the pipeline capture backing this host.
    #[must_use]
    pub fn capture(&self) -> &PipelineCapture {
        &self.capture
    }
}

impl fmt::Debug for TestHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHost")
            .field("app_name", &self.app_name)
            .field("disposed", &self.is_disposed())
            .field("materialized", &self.capture.is_materialized())
            .finish_non_exhaustive()
    }
}

enum Source {
    Callback {
        configure: ConfigureFn,
        type_name: &'static str,
    },
    Startup(StartupRef),
    Named(String),
}

/// Builder for a [`TestHost`].
///
/// # Example
///
/// ```
/// use conduit_middleware::{AppBuilder, PlainTextFaultTranslator};
/// use conduit_test::TestHost;
/// use std::sync::Arc;
///
/// let host = TestHost::builder()
///     .label("inventory")
///     .fault_translator(Arc::new(PlainTextFaultTranslator))
///     .configure(|app: &mut AppBuilder| {
///         app.run(|_ctx| Box::pin(async { Ok(()) }));
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(host.app_name(), "inventory");
/// ```
#[must_use]
#[derive(Default)]
pub struct TestHostBuilder {
    engine: Option<Arc<dyn HostingEngine>>,
    translator: Option<Arc<dyn FaultTranslator>>,
    label: Option<String>,
    options: Option<StartOptions>,
    source: Option<Source>,
}

impl TestHostBuilder {
    /// Sets the hosting engine. Defaults to [`DefaultHostingEngine`].
    pub fn engine(mut self, engine: Arc<dyn HostingEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the translator used by the safety wrapper on the callback path.
    /// Defaults to [`JsonFaultTranslator`].
    pub fn fault_translator(mut self, translator: Arc<dyn FaultTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Sets the application name used when the options leave it blank.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the startup options.
    pub fn options(mut self, options: StartOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Configures the application with a closure.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut AppBuilder) + Send + Sync + 'static,
    {
        self.source = Some(Source::Callback {
            configure: Arc::new(configure),
            type_name: std::any::type_name::<F>(),
        });
        self
    }

    /// Configures the application with the startup type `T`.
    pub fn startup<T: Startup + Default>(mut self) -> Self {
        self.source = Some(Source::Startup(StartupRef::of::<T>()));
        self
    }

    /// Configures the application with a startup registered in the engine.
    pub fn startup_named(mut self, name: impl Into<String>) -> Self {
        self.source = Some(Source::Named(name.into()));
        self
    }

    /// Starts the application and returns its host.
    pub fn build(self) -> Result<TestHost, HostError> {
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(DefaultHostingEngine::new()));
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(JsonFaultTranslator::new()));

        let mut orchestrator = Orchestrator::new(engine, translator);
        if let Some(label) = self.label {
            orchestrator = orchestrator.label(label);
        }

        match self.source {
            Some(Source::Callback {
                configure,
                type_name,
            }) => orchestrator.configure_callback(configure, type_name, self.options)?,
            Some(Source::Startup(startup)) => {
                orchestrator.configure_startup(startup, self.options)?;
            }
            Some(Source::Named(name)) => {
                orchestrator.configure_with_startup_name(name, self.options)?;
            }
            None => {
                return Err(HostError::InvalidConfiguration(
                    "no configuration callback or startup type was given".to_string(),
                ))
            }
        }

        orchestrator.into_host()
    }
}

impl fmt::Debug for TestHostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHostBuilder")
            .field("label", &self.label)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

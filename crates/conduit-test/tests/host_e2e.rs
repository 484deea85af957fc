//! End-to-end tests for the in-process test host.
//!
//! These tests configure real pipelines through the hosting engine and drive
//! them only through [`TestHost`], the way application tests use it.

use conduit_core::{BoxError, PipelineFault, RequestContext};
use conduit_hosting::{
    DefaultHostingEngine, HostingEngine, HostingResult, LifecycleToken, StartContext,
    StartOptions, Startup,
};
use conduit_middleware::{AppBuilder, JsonFaultTranslator};
use conduit_test::{HostError, Orchestrator, TestHost};
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

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

fn echo_path(app: &mut AppBuilder) {
    app.use_fn("echo_path", |ctx, _next| {
        Box::pin(async move {
            let path = ctx.request_path().to_string();
            ctx.set_response_status(StatusCode::OK);
            ctx.write_body(path);
            Ok(())
        })
    });
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn test_callback_host_dispatches_without_error() {
    let host = TestHost::from_fn(|_app: &mut AppBuilder| {}).unwrap();

    let mut ctx = RequestContext::new();
    host.dispatch(&mut ctx).await.unwrap();

    // No terminal was configured.
    assert_eq!(ctx.response_status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_missing_callback_fails_before_engine_start() {
    let engine = Arc::new(CountingEngine::default());
    let mut orchestrator = Orchestrator::new(engine.clone(), Arc::new(JsonFaultTranslator::new()));

    let err = orchestrator
        .configure_with_callback(None::<fn(&mut AppBuilder)>, None)
        .unwrap_err();

    assert!(matches!(err, HostError::InvalidConfiguration(_)));
    assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reconfiguration_is_rejected() {
    let engine = Arc::new(CountingEngine::default());
    let mut orchestrator = Orchestrator::new(engine.clone(), Arc::new(JsonFaultTranslator::new()));

    orchestrator
        .configure_with_callback(Some(echo_path), None)
        .unwrap();
    let err = orchestrator
        .configure_with_callback(Some(echo_path), None)
        .unwrap_err();

    assert!(matches!(err, HostError::AlreadyConfigured));
    assert_eq!(engine.starts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_start_failure_propagates() {
    #[derive(Default)]
    struct MisconfiguredApp;

    impl Startup for MisconfiguredApp {
        fn configuration(&self, _app: &mut AppBuilder) -> Result<(), BoxError> {
            Err("no database configured".into())
        }
    }

    let err = TestHost::from_startup::<MisconfiguredApp>().unwrap_err();

    assert!(matches!(err, HostError::EngineStart(_)));
    assert!(err.to_string().contains("no database configured"));
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_ping_echo_scenario() {
    let host = TestHost::from_fn(echo_path).unwrap();

    let mut ctx = RequestContext::new();
    ctx.set_request_path("/ping");
    host.dispatch(&mut ctx).await.unwrap();

    assert_eq!(ctx.response_status(), StatusCode::OK);
    assert_eq!(ctx.response_body(), b"/ping");
}

#[tokio::test]
async fn test_throwing_middleware_yields_failure_response() {
    let host = TestHost::from_fn(|app: &mut AppBuilder| {
        app.use_fn("throws", |_ctx, _next| {
            Box::pin(async { Err(BoxError::from("unhandled")) })
        });
    })
    .unwrap();

    let response = host.get("/orders").send().await;

    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_header("content-type", "application/json")
        .assert_json_field("error.code", &json!("INTERNAL_ERROR"));
}

#[tokio::test]
async fn test_panicking_middleware_yields_failure_response() {
    let host = TestHost::from_fn(|app: &mut AppBuilder| {
        app.run(|ctx| {
            Box::pin(async move {
                if ctx.request_path() == "/" {
                    panic!("index out of bounds");
                }
                Ok(())
            })
        });
    })
    .unwrap();

    let mut ctx = RequestContext::new();
    host.dispatch(&mut ctx).await.unwrap();

    assert_eq!(ctx.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_middleware_before_fault_runs_fully() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let host = TestHost::from_fn(move |app: &mut AppBuilder| {
        let recorder = Arc::clone(&recorder);
        app.use_fn("records", move |ctx, next| {
            let recorder = Arc::clone(&recorder);
            Box::pin(async move {
                recorder.lock().push("before");
                let result = next.run(ctx).await;
                recorder.lock().push("after");
                result
            })
        });
        app.run(|_ctx| Box::pin(async { Err(BoxError::from("terminal failed")) }));
    })
    .unwrap();

    let mut ctx = RequestContext::new();
    host.dispatch(&mut ctx).await.unwrap();

    assert_eq!(*seen.lock(), vec!["before", "after"]);
    assert_eq!(ctx.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_custom_translator_is_used() {
    let host = TestHost::builder()
        .fault_translator(Arc::new(
            JsonFaultTranslator::new()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .expose_details(true),
        ))
        .configure(|app: &mut AppBuilder| {
            app.run(|_ctx| Box::pin(async { Err(BoxError::from("upstream timed out")) }));
        })
        .build()
        .unwrap();

    host.get("/")
        .send()
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE)
        .assert_json_field("error.code", &json!("SERVICE_UNAVAILABLE"))
        .assert_json_field("error.message", &json!("upstream timed out"));
}

#[tokio::test]
async fn test_sequential_dispatches_reach_same_terminal() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let host = TestHost::from_fn(move |app: &mut AppBuilder| {
        let counter = Arc::clone(&counter);
        app.run(move |ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                ctx.write_body(n.to_string());
                Ok(())
            })
        });
    })
    .unwrap();

    for expected in ["1", "2"] {
        let mut ctx = RequestContext::new();
        ctx.set_request_path("/same");
        host.dispatch(&mut ctx).await.unwrap();
        assert_eq!(ctx.response_body(), expected.as_bytes());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_suspending_middleware_is_awaited() {
    let host = TestHost::from_fn(|app: &mut AppBuilder| {
        app.use_fn("slow", |ctx, next| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ctx.response_headers_mut()
                    .insert("x-slow", "true".parse()?);
                next.run(ctx).await
            })
        });
        echo_path(app);
    })
    .unwrap();

    let response = host.get("/later").send().await;

    response
        .assert_status(StatusCode::OK)
        .assert_header("x-slow", "true")
        .assert_body_eq("/later");
}

#[tokio::test]
async fn test_concurrent_dispatches() {
    let host = Arc::new(TestHost::from_fn(echo_path).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let host = Arc::clone(&host);
            tokio::spawn(async move {
                let mut ctx = RequestContext::new();
                ctx.set_request_path(format!("/item/{i}"));
                host.dispatch(&mut ctx).await.unwrap();
                (i, ctx.response_body().to_vec())
            })
        })
        .collect();

    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body, format!("/item/{i}").into_bytes());
    }
}

// =============================================================================
// Disposal
// =============================================================================

#[tokio::test]
async fn test_dispose_releases_token_once_and_blocks_dispatch() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);

    let host = TestHost::from_fn(move |app: &mut AppBuilder| {
        let counter = Arc::clone(&counter);
        app.on_disposing("close_pool", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        echo_path(app);
    })
    .unwrap();

    host.dispose().unwrap();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    let mut ctx = RequestContext::new();
    assert!(matches!(
        host.dispatch(&mut ctx).await,
        Err(HostError::Disposed)
    ));

    assert!(matches!(host.dispose(), Err(HostError::Disposed)));
    drop(host);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Startup-type path
// =============================================================================

#[derive(Default)]
struct OrdersApp;

impl Startup for OrdersApp {
    fn configuration(&self, app: &mut AppBuilder) -> Result<(), BoxError> {
        let region = app.property("orders.region").unwrap_or("local").to_string();
        app.use_fn("fails_on_boom", |ctx, next| {
            Box::pin(async move {
                if ctx.request_path() == "/boom" {
                    return Err("order store unavailable".into());
                }
                next.run(ctx).await
            })
        });
        app.run(move |ctx| {
            let region = region.clone();
            Box::pin(async move {
                ctx.write_body(region);
                Ok(())
            })
        });
        Ok(())
    }
}

#[tokio::test]
async fn test_startup_type_host_passes_settings() {
    let host = TestHost::from_startup_with::<OrdersApp>(
        StartOptions::new().with_setting("orders.region", "eu-west-1"),
    )
    .unwrap();

    assert!(host.app_name().ends_with("OrdersApp"));
    host.get("/orders").send().await.assert_body_eq("eu-west-1");
}

#[tokio::test]
async fn test_startup_type_path_has_no_safety_wrapper() {
    let startup_host = TestHost::from_startup::<OrdersApp>().unwrap();
    let callback_host = TestHost::from_fn(|app: &mut AppBuilder| {
        OrdersApp.configuration(app).unwrap();
    })
    .unwrap();

    let mut ctx = RequestContext::new();
    ctx.set_request_path("/boom");
    let err = startup_host.dispatch(&mut ctx).await.unwrap_err();
    match err {
        HostError::Unhandled(PipelineFault::Error(e)) => {
            assert_eq!(e.to_string(), "order store unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut ctx = RequestContext::new();
    ctx.set_request_path("/boom");
    callback_host.dispatch(&mut ctx).await.unwrap();
    assert_eq!(ctx.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_named_startup_through_injected_engine() {
    let engine = Arc::new(DefaultHostingEngine::new());
    engine.register_startup::<OrdersApp>("orders");

    let host = TestHost::builder()
        .engine(engine)
        .startup_named("orders")
        .options(StartOptions::from_json_str(r#"{"settings":{"orders.region":"us-east-2"}}"#).unwrap())
        .build()
        .unwrap();

    assert_eq!(host.app_name(), "orders");
    host.get("/").send().await.assert_body_eq("us-east-2");
}

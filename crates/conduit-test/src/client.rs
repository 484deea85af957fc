//! Fluent request API on [`TestHost`].

use crate::error::TestError;
use crate::host::TestHost;
use crate::request::TestRequest;
use crate::response::TestResponse;
use bytes::Bytes;
use http::Method;

impl TestHost {
    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::new(method, uri))
    }
}

/// A request builder bound to a test host.
///
/// # Example
///
/// ```
/// use conduit_middleware::AppBuilder;
/// use conduit_test::TestHost;
/// use http::StatusCode;
///
/// # tokio_test::block_on(async {
/// let host = TestHost::from_fn(|app: &mut AppBuilder| {
///     app.run(|ctx| {
///         Box::pin(async move {
///             ctx.set_response_status(StatusCode::CREATED);
///             Ok(())
///         })
///     });
/// })
/// .unwrap();
///
/// let response = host.post("/orders").json(&serde_json::json!({"qty": 2})).send().await;
/// response.assert_status(StatusCode::CREATED);
/// # });
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    host: &'a TestHost,
    request: TestRequest,
}

impl<'a> TestClientRequest<'a> {
    fn new(host: &'a TestHost, request: TestRequest) -> Self {
        Self { host, request }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.request = self.request.content_type(content_type);
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.request = self.request.bearer_token(token);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request = self.request.body(body);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.request = self.request.json(value);
        self
    }

    /// Stores an extra value in the request context before dispatch.
    pub fn item<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.request = self.request.item(key, value);
        self
    }

    /// Dispatches the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the request is invalid or the host rejects it. Use
    /// [`try_send`](Self::try_send) to get the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Dispatches the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let mut ctx = self.request.build()?;
        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %ctx.request_method(),
            path = ctx.request_path(),
            "Dispatching test request"
        );

        self.host.dispatch(&mut ctx).await?;
        Ok(TestResponse::from_context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use conduit_core::BoxError;
    use conduit_middleware::AppBuilder;
    use http::StatusCode;
    use serde_json::json;

    /// Echoes method, path, authorization and body back as JSON.
    fn echo_host() -> TestHost {
        TestHost::from_fn(|app: &mut AppBuilder| {
            app.run(|ctx| {
                let auth = ctx
                    .request_headers()
                    .and_then(|headers| headers.get("authorization"))
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let body = json!({
                    "method": ctx.request_method().as_str(),
                    "path": ctx.request_path(),
                    "auth": auth,
                    "body": String::from_utf8_lossy(&ctx.request_body()),
                });
                Box::pin(async move {
                    ctx.write_body(body.to_string());
                    Ok(())
                })
            });
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_methods() {
        let host = echo_host();

        for (response, method) in [
            (host.get("/r").send().await, "GET"),
            (host.post("/r").send().await, "POST"),
            (host.put("/r").send().await, "PUT"),
            (host.patch("/r").send().await, "PATCH"),
            (host.delete("/r").send().await, "DELETE"),
            (host.request(Method::OPTIONS, "/r").send().await, "OPTIONS"),
        ] {
            response.assert_json_field("method", &json!(method));
        }
    }

    #[tokio::test]
    async fn test_headers_and_body_reach_pipeline() {
        let host = echo_host();

        let response = host
            .post("/users")
            .bearer_token("my_token")
            .body("raw")
            .send()
            .await;

        response
            .assert_status(StatusCode::OK)
            .assert_json_field("path", &json!("/users"))
            .assert_json_field("auth", &json!("Bearer my_token"))
            .assert_json_field("body", &json!("raw"));
    }

    #[tokio::test]
    async fn test_try_send_after_dispose() {
        let host = echo_host();
        host.dispose().unwrap();

        let err = host.get("/users").try_send().await.unwrap_err();

        assert!(matches!(err, TestError::Host(HostError::Disposed)));
    }

    #[tokio::test]
    async fn test_try_send_reports_invalid_header() {
        let host = echo_host();

        let err = host
            .get("/users")
            .header("bad header", "x")
            .try_send()
            .await
            .unwrap_err();

        assert!(matches!(err, TestError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_items_reach_pipeline() {
        let host = TestHost::from_fn(|app: &mut AppBuilder| {
            app.run(|ctx| {
                let tenant = ctx.get::<String>("app.Tenant").cloned().unwrap_or_default();
                Box::pin(async move {
                    ctx.write_body(tenant);
                    Ok(())
                })
            });
        })
        .unwrap();

        host.get("/")
            .item("app.Tenant", "acme".to_string())
            .send()
            .await
            .assert_body_eq("acme");
    }

    #[tokio::test]
    async fn test_fault_envelope_names_dispatched_request() {
        let host = TestHost::from_fn(|app: &mut AppBuilder| {
            app.run(|_ctx| Box::pin(async { Err(BoxError::from("ledger offline")) }));
        })
        .unwrap();

        let response = host.post("/transfers").send().await;

        response.assert_fault("INTERNAL_ERROR");
        assert_eq!(
            response.fault().unwrap()["request_id"],
            response.request_id().to_string()
        );
    }
}

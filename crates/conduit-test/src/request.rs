//! Request contexts for test dispatches.
//!
//! [`TestRequest`] fills the request slots of a fresh [`RequestContext`]:
//! method, path and query from the URI, headers, body, plus any extra slots a
//! test wants middleware to see.

use crate::error::TestError;
use bytes::Bytes;
use conduit_core::{keys, RequestContext, RequestId};
use http::{header, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;

/// Builds the [`RequestContext`] for one dispatch.
///
/// Invalid URIs, headers or JSON bodies are remembered and reported by
/// [`build`](Self::build), so calls can be chained freely. Only the first
/// problem is kept.
///
/// # Example
///
/// ```
/// use conduit_test::TestRequest;
/// use http::Method;
///
/// let ctx = TestRequest::post("/orders?dry_run=true")
///     .header("X-Tenant", "acme")
///     .item("app.UserId", 42_u64)
///     .build()
///     .unwrap();
///
/// assert_eq!(ctx.request_method(), Method::POST);
/// assert_eq!(ctx.request_path(), "/orders");
/// assert_eq!(ctx.request_query(), "dry_run=true");
/// assert_eq!(ctx.request_headers().unwrap()["x-tenant"], "acme");
/// assert_eq!(ctx.get::<u64>("app.UserId"), Some(&42));
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestRequest {
    ctx: RequestContext,
    error: Option<TestError>,
}

impl TestRequest {
    /// Starts a request with the given method and URI.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        let mut request = Self {
            ctx: RequestContext::new(),
            error: None,
        };
        request.ctx.set_request_method(method);

        match uri.as_ref().parse::<Uri>() {
            Ok(uri) => {
                request.ctx.set_request_path(uri.path());
                request.ctx.set_request_query(uri.query().unwrap_or_default());
            }
            Err(e) => request.fail(TestError::RequestBuild(format!("Invalid URI: {e}"))),
        }
        request
    }

    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> Self {
        Self::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> Self {
        Self::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }

    /// Sets a request header, replacing earlier values.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let parsed = HeaderName::try_from(name)
            .map_err(|e| e.to_string())
            .and_then(|n| {
                HeaderValue::try_from(value.as_ref())
                    .map(|v| (n, v))
                    .map_err(|e| e.to_string())
            });

        match parsed {
            Ok((name, value)) => {
                self.ctx.request_headers_mut().insert(name, value);
            }
            Err(e) => self.fail(TestError::InvalidHeader(format!("{name}: {e}"))),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.ctx.set_request_body(body);
        self
    }

    /// Sets the request body as JSON along with `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body(bytes).content_type("application/json"),
            Err(e) => {
                self.fail(TestError::Json(e));
                self
            }
        }
    }

    /// Stores an extra value in the context before dispatch.
    ///
    /// Use this for slots a host would normally fill in, such as an
    /// authenticated user or a trace handle.
    pub fn item<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.ctx.insert(key, value);
        self
    }

    /// Replaces the generated request ID.
    pub fn request_id(mut self, id: RequestId) -> Self {
        self.ctx.insert(keys::REQUEST_ID, id);
        self
    }

    /// Returns the context, or the first error recorded while building it.
    pub fn build(self) -> Result<RequestContext, TestError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.ctx),
        }
    }
}

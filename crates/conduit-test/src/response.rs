//! Responses read back from a dispatched context.

use crate::error::TestError;
use bytes::Bytes;
use conduit_core::{RequestContext, RequestId};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// The response slots of a context after dispatch, with assertion helpers.
///
/// The request ID of the exchange is kept so failure envelopes written by
/// the safety wrapper can be checked against it.
pub struct TestResponse {
    request_id: RequestId,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Takes the response out of a dispatched context.
    #[must_use]
    pub fn from_context(ctx: RequestContext) -> Self {
        let request_id = ctx.request_id();
        let (parts, body) = ctx.into_response().into_parts();
        Self {
            request_id,
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Returns the request ID of the exchange.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<&str, TestError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the `error` object of a failure envelope, if the body is one.
    #[must_use]
    pub fn fault(&self) -> Option<Value> {
        self.json::<Value>()
            .ok()?
            .get_mut("error")
            .map(Value::take)
    }

    /// Asserts the status code.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}",
            expected, self.status
        );
        self
    }

    /// Asserts that a header is present with the expected value.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected.as_ref(), "Header '{name}' mismatch");
        self
    }

    /// Asserts the body text.
    pub fn assert_body_eq(&self, expected: impl AsRef<str>) -> &Self {
        match self.text() {
            Ok(body) => assert_eq!(body, expected.as_ref(), "Body mismatch"),
            Err(e) => panic!("{e}"),
        }
        self
    }

    /// Asserts a JSON field.
    ///
    /// Paths are dot-separated; numeric segments index into arrays.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &Value) -> &Self {
        let path = path.as_ref();
        let json: Value = match self.json() {
            Ok(json) => json,
            Err(e) => panic!("Body is not JSON: {e}"),
        };
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in: {json}"));
        assert_eq!(actual, expected, "JSON field '{path}' mismatch");
        self
    }

    /// Asserts that the body is a failure envelope with the given code that
    /// names this exchange's request ID.
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_core::BoxError;
    /// use conduit_middleware::AppBuilder;
    /// use conduit_test::TestHost;
    ///
    /// # tokio_test::block_on(async {
    /// let host = TestHost::from_fn(|app: &mut AppBuilder| {
    ///     app.run(|_ctx| Box::pin(async { Err(BoxError::from("ledger offline")) }));
    /// })
    /// .unwrap();
    ///
    /// host.get("/balance").send().await.assert_fault("INTERNAL_ERROR");
    /// # });
    /// ```
    pub fn assert_fault(&self, code: &str) -> &Self {
        assert!(
            self.status.is_client_error() || self.status.is_server_error(),
            "Expected a failure status, got {}",
            self.status
        );
        let fault = self
            .fault()
            .unwrap_or_else(|| panic!("Body is not a failure envelope: {:?}", self.text()));
        assert_eq!(fault["code"], code, "Fault code mismatch");
        assert_eq!(
            fault["request_id"],
            self.request_id.to_string(),
            "Fault names another request"
        );
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("request_id", &self.request_id)
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match segment.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(segment),
        })
}

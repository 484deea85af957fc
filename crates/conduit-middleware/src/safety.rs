//! Safety wrapper middleware.
//!
//! The safety wrapper sits at the head of a chain and guarantees that no
//! fault raised downstream escapes a dispatch call. Returned errors and
//! panics are both caught, logged, and handed to a [`FaultTranslator`]
//! that writes a failure response into the context.
//!
//! # Pipeline Position
//!
//! ```text
//! dispatch → [SafetyWrapper] → caller middleware … → endpoint
//!                  ↑                                     │
//!                  └──── error / panic ──────────────────┘
//! ```
//!
//! # Error Envelope Format
//!
//! The default [`JsonFaultTranslator`] writes a `500` with this body:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "INTERNAL_ERROR",
//!     "message": "An internal error occurred",
//!     "request_id": "uuid-v7-request-id"
//!   }
//! }
//! ```

use crate::middleware::{BoxFuture, Middleware, MiddlewareResult, Next};
use conduit_core::{PipelineFault, RequestContext};
use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Converts a caught fault into a failure response.
///
/// Implementations write status, headers and body into the context. Closures
/// with the matching signature implement this trait.
pub trait FaultTranslator: Send + Sync + 'static {
    /// Writes the failure response for `fault` into `ctx`.
    fn translate(&self, ctx: &mut RequestContext, fault: &PipelineFault);
}

impl<F> FaultTranslator for F
where
    F: Fn(&mut RequestContext, &PipelineFault) + Send + Sync + 'static,
{
    fn translate(&self, ctx: &mut RequestContext, fault: &PipelineFault) {
        self(ctx, fault);
    }
}

/// Writes the standard JSON error envelope.
#[derive(Debug, Clone)]
pub struct JsonFaultTranslator {
    /// Status code of the failure response.
    status: StatusCode,
    /// Whether the fault message is exposed to the client.
    expose_details: bool,
    /// Message used when details are hidden.
    message: String,
}

impl Default for JsonFaultTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFaultTranslator {
    /// Creates a translator that hides fault details behind a generic message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            expose_details: false,
            message: "An internal error occurred".to_string(),
        }
    }

    /// Sets whether the fault message is written to the response body.
    ///
    /// Handy in tests that assert on the failing middleware's message.
    #[must_use]
    pub fn expose_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }

    /// Sets the generic message used when details are hidden.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the response status. Non-error codes are ignored.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        if status.is_client_error() || status.is_server_error() {
            self.status = status;
        }
        self
    }

    fn status_to_code(status: StatusCode) -> String {
        match status.as_u16() {
            400 => "BAD_REQUEST".to_string(),
            401 => "UNAUTHORIZED".to_string(),
            403 => "FORBIDDEN".to_string(),
            404 => "NOT_FOUND".to_string(),
            405 => "METHOD_NOT_ALLOWED".to_string(),
            408 => "REQUEST_TIMEOUT".to_string(),
            409 => "CONFLICT".to_string(),
            422 => "UNPROCESSABLE_ENTITY".to_string(),
            429 => "RATE_LIMITED".to_string(),
            500 => "INTERNAL_ERROR".to_string(),
            502 => "BAD_GATEWAY".to_string(),
            503 => "SERVICE_UNAVAILABLE".to_string(),
            504 => "GATEWAY_TIMEOUT".to_string(),
            other => format!("HTTP_{other}"),
        }
    }
}

impl FaultTranslator for JsonFaultTranslator {
    fn translate(&self, ctx: &mut RequestContext, fault: &PipelineFault) {
        let message = if self.expose_details {
            fault.message()
        } else {
            self.message.clone()
        };

        let body = serde_json::json!({
            "error": {
                "code": Self::status_to_code(self.status),
                "message": message,
                "request_id": ctx.request_id().to_string()
            }
        });

        ctx.clear_response();
        ctx.set_response_status(self.status);
        ctx.response_headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ctx.write_body(body.to_string());
    }
}

/// Writes a bare `500 Internal Server Error` text response.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFaultTranslator;

impl FaultTranslator for PlainTextFaultTranslator {
    fn translate(&self, ctx: &mut RequestContext, _fault: &PipelineFault) {
        ctx.clear_response();
        ctx.set_response_status(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.response_headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        ctx.write_body("Internal Server Error");
    }
}

/// Fault boundary placed at the head of every callback-configured chain.
#[derive(Clone)]
pub struct SafetyWrapper {
    translator: Arc<dyn FaultTranslator>,
}

impl Default for SafetyWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyWrapper {
    /// Creates a wrapper using [`JsonFaultTranslator`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_translator(Arc::new(JsonFaultTranslator::new()))
    }

    /// Creates a wrapper with a custom translator.
    #[must_use]
    pub fn with_translator(translator: Arc<dyn FaultTranslator>) -> Self {
        Self { translator }
    }
}

impl std::fmt::Debug for SafetyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyWrapper").finish_non_exhaustive()
    }
}

impl Middleware for SafetyWrapper {
    fn name(&self) -> &'static str {
        "safety_wrapper"
    }

    fn invoke<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(ctx)).catch_unwind().await;

            let fault = match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(error)) => PipelineFault::Error(error),
                Err(payload) => PipelineFault::from_panic(payload),
            };

            tracing::error!(
                request_id = %ctx.request_id(),
                method = %ctx.request_method(),
                path = ctx.request_path(),
                error = %fault,
                "Unhandled pipeline fault"
            );

            self.translator.translate(ctx, &fault);
            Ok(())
        })
    }
}

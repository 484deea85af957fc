//! The per-exchange request context.
//!
//! A [`RequestContext`] represents one request/response exchange. It is
//! created by the caller, passed by `&mut` through every middleware in the
//! chain, and inspected by the caller once dispatch completes. Nothing in
//! the host retains it afterwards.

use crate::keys;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, StatusCode};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier assigned to every request context.
///
/// Uses UUID v7 so identifiers are time-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

type Slot = Box<dyn Any + Send + Sync>;

/// A mutable mapping from string keys to typed values.
///
/// Values are stored type-erased; readers name the type they expect and get
/// `None` when the slot is missing or holds something else. The typed
/// accessors for the keys in [`keys`] fall back to sensible defaults instead,
/// so middleware can read a fresh context without checking every slot.
///
/// # Example
///
/// ```
/// use conduit_core::RequestContext;
/// use http::Method;
///
/// let mut ctx = RequestContext::new();
/// ctx.set_request_method(Method::POST);
/// ctx.write_body(b"hello");
///
/// assert_eq!(ctx.request_method(), Method::POST);
/// assert_eq!(ctx.response_body(), b"hello");
/// ```
pub struct RequestContext {
    values: HashMap<String, Slot>,
}

impl RequestContext {
    /// Creates a context for a `GET /` request with a fresh request ID.
    ///
    /// The response starts as `200 OK` with no headers and an empty body.
    #[must_use]
    pub fn new() -> Self {
        let mut ctx = Self::empty();
        ctx.insert(keys::REQUEST_ID, RequestId::new());
        ctx.insert(keys::REQUEST_METHOD, Method::GET);
        ctx.insert(keys::REQUEST_PATH, String::from("/"));
        ctx.insert(keys::REQUEST_QUERY, String::new());
        ctx.insert(keys::REQUEST_HEADERS, HeaderMap::new());
        ctx.insert(keys::REQUEST_BODY, Bytes::new());
        ctx.insert(keys::RESPONSE_STATUS, StatusCode::OK);
        ctx.insert(keys::RESPONSE_HEADERS, HeaderMap::new());
        ctx.insert(keys::RESPONSE_BODY, BytesMut::new());
        ctx
    }

    /// Creates a context with no slots at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Builds a context from an HTTP request whose body is already buffered.
    #[must_use]
    pub fn from_request(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut ctx = Self::new();
        ctx.set_request_method(parts.method);
        ctx.set_request_path(parts.uri.path());
        ctx.set_request_query(parts.uri.query().unwrap_or_default());
        ctx.insert(keys::REQUEST_HEADERS, parts.headers);
        ctx.set_request_body(body);
        ctx
    }

    /// Converts the response slots of this context into an HTTP response.
    #[must_use]
    pub fn into_response(mut self) -> http::Response<Bytes> {
        let status = self.response_status();
        let headers = self
            .remove::<HeaderMap>(keys::RESPONSE_HEADERS)
            .unwrap_or_default();
        let body = self
            .remove::<BytesMut>(keys::RESPONSE_BODY)
            .unwrap_or_default()
            .freeze();

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    // ------------------------------------------------------------------
    // Raw map access
    // ------------------------------------------------------------------

    /// Stores a value under `key`, replacing any previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if it exists and has type `T`.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Returns a mutable reference to the value under `key` if it has type `T`.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Removes the slot under `key` and returns it if it had type `T`.
    ///
    /// The slot is removed even when the type does not match.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<T> {
        self.values
            .remove(key)
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks whether any value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates over the keys currently present.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the slot under `key`, resetting it to `T::default()` when it is
    /// missing or holds another type.
    fn slot_mut<T: Default + Send + Sync + 'static>(&mut self, key: &str) -> &mut T {
        let slot = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Box::new(T::default()) as Slot);
        if !(**slot).is::<T>() {
            *slot = Box::new(T::default());
        }
        (**slot)
            .downcast_mut::<T>()
            .expect("slot holds the requested type")
    }

    // ------------------------------------------------------------------
    // Request accessors
    // ------------------------------------------------------------------

    /// Returns the request ID, or the nil UUID if the slot was removed.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.get::<RequestId>(keys::REQUEST_ID)
            .copied()
            .unwrap_or_else(|| RequestId::from_uuid(Uuid::nil()))
    }

    /// Returns the request method, defaulting to `GET`.
    #[must_use]
    pub fn request_method(&self) -> Method {
        self.get::<Method>(keys::REQUEST_METHOD)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the request method.
    pub fn set_request_method(&mut self, method: Method) {
        self.insert(keys::REQUEST_METHOD, method);
    }

    /// Returns the request path, or an empty string if unset.
    #[must_use]
    pub fn request_path(&self) -> &str {
        self.get::<String>(keys::REQUEST_PATH)
            .map_or("", String::as_str)
    }

    /// Sets the request path.
    pub fn set_request_path(&mut self, path: impl Into<String>) {
        self.insert(keys::REQUEST_PATH, path.into());
    }

    /// Returns the raw query string, or an empty string if unset.
    #[must_use]
    pub fn request_query(&self) -> &str {
        self.get::<String>(keys::REQUEST_QUERY)
            .map_or("", String::as_str)
    }

    /// Sets the raw query string.
    pub fn set_request_query(&mut self, query: impl Into<String>) {
        self.insert(keys::REQUEST_QUERY, query.into());
    }

    /// Returns the request headers.
    #[must_use]
    pub fn request_headers(&self) -> Option<&HeaderMap> {
        self.get(keys::REQUEST_HEADERS)
    }

    /// Returns the request headers for modification.
    pub fn request_headers_mut(&mut self) -> &mut HeaderMap {
        self.slot_mut(keys::REQUEST_HEADERS)
    }

    /// Returns the request body, or an empty body if unset.
    #[must_use]
    pub fn request_body(&self) -> Bytes {
        self.get::<Bytes>(keys::REQUEST_BODY)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the request body.
    pub fn set_request_body(&mut self, body: impl Into<Bytes>) {
        self.insert(keys::REQUEST_BODY, body.into());
    }

    // ------------------------------------------------------------------
    // Response accessors
    // ------------------------------------------------------------------

    /// Returns the response status, defaulting to `200 OK`.
    #[must_use]
    pub fn response_status(&self) -> StatusCode {
        self.get::<StatusCode>(keys::RESPONSE_STATUS)
            .copied()
            .unwrap_or_default()
    }

    /// Sets the response status.
    pub fn set_response_status(&mut self, status: StatusCode) {
        self.insert(keys::RESPONSE_STATUS, status);
    }

    /// Returns the response headers.
    #[must_use]
    pub fn response_headers(&self) -> Option<&HeaderMap> {
        self.get(keys::RESPONSE_HEADERS)
    }

    /// Returns the response headers for modification.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        self.slot_mut(keys::RESPONSE_HEADERS)
    }

    /// Returns the bytes written to the response body so far.
    #[must_use]
    pub fn response_body(&self) -> &[u8] {
        self.get::<BytesMut>(keys::RESPONSE_BODY)
            .map_or(&[][..], |body| &body[..])
    }

    /// Appends to the response body.
    pub fn write_body(&mut self, data: impl AsRef<[u8]>) {
        self.slot_mut::<BytesMut>(keys::RESPONSE_BODY)
            .extend_from_slice(data.as_ref());
    }

    /// Resets status, headers and body of the response.
    ///
    /// Used by fault translators before writing a failure response.
    pub fn clear_response(&mut self) {
        self.set_response_status(StatusCode::OK);
        self.response_headers_mut().clear();
        self.slot_mut::<BytesMut>(keys::RESPONSE_BODY).clear();
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("RequestContext")
            .field("keys", &keys)
            .finish()
    }
}

//! Well-known request context keys.
//!
//! The key names form a vocabulary shared between hosts and middleware. The
//! context does not enforce it: any string is a valid key and unknown keys are
//! forwarded untouched.

/// HTTP method of the request ([`http::Method`]).
pub const REQUEST_METHOD: &str = "conduit.RequestMethod";

/// Request path without the query string (`String`).
pub const REQUEST_PATH: &str = "conduit.RequestPath";

/// Raw query string without the leading `?` (`String`).
pub const REQUEST_QUERY: &str = "conduit.RequestQueryString";

/// Request headers ([`http::HeaderMap`]).
pub const REQUEST_HEADERS: &str = "conduit.RequestHeaders";

/// Request body ([`bytes::Bytes`]).
pub const REQUEST_BODY: &str = "conduit.RequestBody";

/// Response status ([`http::StatusCode`]).
pub const RESPONSE_STATUS: &str = "conduit.ResponseStatusCode";

/// Response headers ([`http::HeaderMap`]).
pub const RESPONSE_HEADERS: &str = "conduit.ResponseHeaders";

/// Response body buffer ([`bytes::BytesMut`]).
pub const RESPONSE_BODY: &str = "conduit.ResponseBody";

/// Per-exchange request identifier ([`crate::RequestId`]).
pub const REQUEST_ID: &str = "conduit.RequestId";

/// Application name the host was started with (`String`).
pub const HOST_APP_NAME: &str = "host.AppName";

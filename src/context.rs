//! Per-request state shared by every stage of the pipeline.
//!
//! A [`RequestContext`] is created when a request arrives, mutated in place
//! by the middleware chain (decoded query/body, bound route parameters, the
//! transient options slot) and discarded once the response has been handed
//! back to the listener. It is owned by exactly one worker for the lifetime
//! of one request, so none of its fields need locking.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use http::Method;
use serde_json::Value;

use crate::router::Route;

/// A file extracted from a `multipart/form-data` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Form field the file was submitted under
    pub field: String,
    /// Client-supplied file name
    pub filename: String,
    /// Declared content type of the part (empty when the client sent none)
    pub content_type: String,
    /// Raw file bytes
    pub data: Vec<u8>,
}

/// The response under construction for one request.
///
/// The pipeline only ever sets the status, inserts headers and writes the
/// body; socket handling belongs to the listener layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Response headers (case preserved as written)
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn body_vec(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable per-request state threaded through the middleware chain.
#[derive(Clone)]
pub struct RequestContext {
    /// HTTP method of the request
    pub method: Method,
    /// Request path with any query string already stripped
    pub path: String,
    /// Listener protocol the request arrived on (`http` / `https`)
    pub protocol: String,
    /// Name or address of the listener endpoint that accepted the request
    pub endpoint: String,
    /// Remote peer address
    pub remote_addr: IpAddr,
    /// Request headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Raw query string (without the leading `?`), if the request had one
    pub raw_query: Option<String>,
    /// Raw request payload bytes
    pub raw_body: Vec<u8>,
    /// Query parameters decoded by the `@query` built-in
    pub query: HashMap<String, Value>,
    /// Structured body decoded by the `@body` built-in
    pub body_data: Option<Value>,
    /// File uploads extracted by the `@body` built-in
    pub files: Vec<UploadedFile>,
    /// Path parameters bound by the `@route-valid` built-in
    pub params: HashMap<String, String>,
    /// Route resolved by the `@route-valid` built-in
    pub route: Option<Arc<Route>>,
    /// Options of the middleware entry currently executing. Set by the chain
    /// engine before each invocation and cleared afterwards.
    pub options: Option<Value>,
    /// The response under construction
    pub response: Response,
}

impl RequestContext {
    /// Create a context with empty decoded state. Callers that sit on a real
    /// listener should go through [`crate::server::parse_request`] instead.
    pub fn new(method: Method, path: impl Into<String>, remote_addr: IpAddr) -> Self {
        Self {
            method,
            path: path.into(),
            protocol: "http".to_string(),
            endpoint: String::new(),
            remote_addr,
            headers: HashMap::new(),
            raw_query: None,
            raw_body: Vec::new(),
            query: HashMap::new(),
            body_data: None,
            files: Vec::new(),
            params: HashMap::new(),
            route: None,
            options: None,
            response: Response::new(),
        }
    }

    /// Bound path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Remainder captured by a trailing route wildcard, if the matched
    /// pattern had one.
    pub fn wildcard(&self) -> Option<&str> {
        self.param("*")
    }

    /// Request header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Declared content type with any parameters (charset, boundary) kept.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Consume the context, yielding the finished response.
    pub fn into_response(self) -> Response {
        self.response
    }
}

use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::{Context, Result};
use http::Method;
use tracing::debug;

use crate::context::RequestContext;

/// The raw request as handed over by the listener layer.
///
/// The pipeline never touches sockets; whatever accepted the connection
/// fills this in and receives a finished [`crate::context::Response`] back.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// HTTP method token
    pub method: String,
    /// Request target: path plus optional query string
    pub target: String,
    /// Listener protocol (`http` / `https`)
    pub protocol: String,
    /// Name of the listener endpoint that accepted the request
    pub endpoint: String,
    /// Remote peer address
    pub remote_addr: IpAddr,
    /// Headers as received (names are lowercased during parsing)
    pub headers: Vec<(String, String)>,
    /// Raw payload bytes
    pub body: Vec<u8>,
}

impl RawRequest {
    pub fn new(method: &str, target: &str, remote_addr: IpAddr) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            protocol: "http".to_string(),
            endpoint: String::new(),
            remote_addr,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Wrap a raw request into the per-request context.
///
/// Splits the target into path and query string and lowercases header
/// names; decoding of query/body is left to the `@query`/`@body` built-ins.
pub fn parse_request(raw: RawRequest) -> Result<RequestContext> {
    let method = Method::from_bytes(raw.method.as_bytes())
        .with_context(|| format!("invalid HTTP method `{}`", raw.method))?;

    let (path, raw_query) = match raw.target.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (raw.target.as_str(), None),
    };
    let path = if path.is_empty() { "/" } else { path };

    let headers: HashMap<String, String> = raw
        .headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_size_bytes = raw.body.len(),
        "Request parsed"
    );

    let mut ctx = RequestContext::new(method, path, raw.remote_addr);
    ctx.protocol = raw.protocol;
    ctx.endpoint = raw.endpoint;
    ctx.headers = headers;
    ctx.raw_query = raw_query;
    ctx.raw_body = raw.body;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

    #[test]
    fn test_target_split() {
        let ctx = parse_request(RawRequest::new("GET", "/p?x=1&y=2", ADDR)).unwrap();
        assert_eq!(ctx.path, "/p");
        assert_eq!(ctx.raw_query.as_deref(), Some("x=1&y=2"));
    }

    #[test]
    fn test_empty_target_becomes_root() {
        let ctx = parse_request(RawRequest::new("GET", "", ADDR)).unwrap();
        assert_eq!(ctx.path, "/");
        assert!(ctx.raw_query.is_none());
    }

    #[test]
    fn test_headers_lowercased() {
        let raw = RawRequest::new("POST", "/upload", ADDR)
            .header("Content-Type", "application/json")
            .body(r#"{"a":1}"#);
        let ctx = parse_request(raw).unwrap();
        assert_eq!(ctx.content_type(), Some("application/json"));
        assert_eq!(ctx.raw_body, br#"{"a":1}"#);
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert!(parse_request(RawRequest::new("GE T", "/", ADDR)).is_err());
    }
}

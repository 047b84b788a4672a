//! Router core module - hot path for request routing.
//!
//! Patterns are compiled once at registration time into an ordered token
//! list (literal / placeholder / trailing wildcard); matching a request is a
//! single walk over the path segments with no per-request compilation.

use std::sync::Arc;

use anyhow::{bail, Result};
use arc_swap::ArcSwap;
use http::Method;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::context::RequestContext;

/// Maximum number of path parameters before heap allocation.
/// Most route patterns bind well under 8 placeholders.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the compiled pattern
/// (known at registration); values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One compiled segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// Matches the segment verbatim
    Literal(String),
    /// Matches exactly one segment, captured under the given name
    Param(Arc<str>),
    /// Matches the entire remaining path; only valid as the final token
    Wildcard,
}

/// A route path pattern compiled into matcher tokens.
///
/// Placeholders are written `{name}` or `:name`; a trailing `*` captures the
/// remainder of the path under the `"*"` parameter.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    tokens: Vec<PatternToken>,
}

impl PathPattern {
    /// Compile a pattern string. Fails on a wildcard anywhere but the final
    /// segment and on empty placeholder names.
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        let mut tokens = Vec::new();
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        for (idx, segment) in segments.iter().enumerate() {
            if *segment == "*" {
                if idx + 1 != segments.len() {
                    bail!("wildcard must be the final segment in `{pattern}`");
                }
                tokens.push(PatternToken::Wildcard);
            } else if let Some(name) = placeholder_name(segment) {
                if name.is_empty() {
                    bail!("empty placeholder name in `{pattern}`");
                }
                tokens.push(PatternToken::Param(Arc::from(name)));
            } else {
                tokens.push(PatternToken::Literal((*segment).to_string()));
            }
        }

        let raw = if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segments.join("/"))
        };

        Ok(Self { raw, tokens })
    }

    /// The canonical pattern string this was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Match `path` against the compiled tokens, returning the captured
    /// parameters on success. A trailing wildcard capture (possibly empty)
    /// is stored under the `"*"` name.
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = ParamVec::new();
        let mut pos = 0usize;

        for token in &self.tokens {
            match token {
                PatternToken::Literal(lit) => {
                    if segments.get(pos).copied() != Some(lit.as_str()) {
                        return None;
                    }
                    pos += 1;
                }
                PatternToken::Param(name) => {
                    let value = segments.get(pos)?;
                    params.push((Arc::clone(name), (*value).to_string()));
                    pos += 1;
                }
                PatternToken::Wildcard => {
                    let rest = segments[pos..].join("/");
                    params.push((Arc::from("*"), rest));
                    return Some(params);
                }
            }
        }

        if pos == segments.len() {
            Some(params)
        } else {
            None
        }
    }
}

/// Handler logic attached to a route, executed after the chain completes.
pub type RouteLogic = Arc<dyn Fn(&mut RequestContext) -> Result<()> + Send + Sync>;

/// A registered route.
///
/// `method: None` is the wildcard method: the route answers any verb, but
/// only as a fallback after exact-method routes have been tried.
pub struct Route {
    pub method: Option<Method>,
    pub pattern: PathPattern,
    /// Restrict to a listener protocol (`http` / `https`); `None` = any
    pub protocol: Option<String>,
    /// Restrict to a named listener endpoint; `None` = any
    pub endpoint: Option<String>,
    /// Routes registered without logic still occupy the table but resolve
    /// to 404 at request time.
    pub logic: Option<RouteLogic>,
}

impl Route {
    pub fn new(method: Option<Method>, pattern: &str, logic: RouteLogic) -> Result<Self> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            protocol: None,
            endpoint: None,
            logic: Some(logic),
        })
    }

    fn accepts(&self, protocol: &str, endpoint: &str) -> bool {
        let protocol_ok = self
            .protocol
            .as_deref()
            .map_or(true, |p| p.eq_ignore_ascii_case(protocol));
        let endpoint_ok = self
            .endpoint
            .as_deref()
            .map_or(true, |e| e.eq_ignore_ascii_case(endpoint));
        protocol_ok && endpoint_ok
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw)
            .field("protocol", &self.protocol)
            .field("endpoint", &self.endpoint)
            .field("has_logic", &self.logic.is_some())
            .finish()
    }
}

/// Result of successfully matching a request path to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (Arc to avoid expensive clones)
    pub route: Arc<Route>,
    /// Path parameters extracted from the URL (e.g. `{id}` → `id=123`)
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// at different path depths, the deepest occurrence is returned.
    #[inline]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remainder captured by a trailing wildcard, if the pattern had one.
    pub fn wildcard(&self) -> Option<&str> {
        self.get_path_param("*")
    }
}

/// The route table.
///
/// Reads take a lock-free snapshot; registration republishes the whole list
/// (copy-and-swap), so request workers never observe a partial update.
pub struct Router {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Register a route. Registration order decides precedence between
    /// routes whose patterns overlap.
    pub fn add_route(&self, route: Route) {
        let route = Arc::new(route);
        info!(
            method = ?route.method,
            pattern = %route.pattern.raw(),
            "Route registered"
        );
        self.routes.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&route));
            next
        });
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    /// Match a request to a route.
    ///
    /// Exact-method routes win over wildcard-method routes; within each
    /// group, registration order wins.
    pub fn route(
        &self,
        method: &Method,
        path: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");
        let snapshot = self.routes.load();

        let exact = self.scan(&snapshot, path, protocol, endpoint, |r| {
            r.method.as_ref() == Some(method)
        });
        let found = exact.or_else(|| {
            self.scan(&snapshot, path, protocol, endpoint, |r| r.method.is_none())
        });

        match found {
            Some(m) => {
                info!(
                    method = %method,
                    path = %path,
                    route_pattern = %m.route.pattern.raw(),
                    path_params = ?m.path_params,
                    "Route matched"
                );
                Some(m)
            }
            None => {
                warn!(method = %method, path = %path, "No route matched");
                None
            }
        }
    }

    fn scan(
        &self,
        routes: &[Arc<Route>],
        path: &str,
        protocol: &str,
        endpoint: &str,
        accept: impl Fn(&Route) -> bool,
    ) -> Option<RouteMatch> {
        routes
            .iter()
            .filter(|r| accept(r) && r.accepts(protocol, endpoint))
            .find_map(|r| {
                r.pattern.matches(path).map(|params| RouteMatch {
                    route: Arc::clone(r),
                    path_params: params,
                })
            })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder_name(segment: &str) -> Option<&str> {
    if let Some(rest) = segment.strip_prefix(':') {
        return Some(rest);
    }
    if segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2 {
        return Some(&segment[1..segment.len() - 1]);
    }
    None
}

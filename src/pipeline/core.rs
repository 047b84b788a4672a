//! Chain execution engine.
//!
//! Entries run strictly in registration order; the first entry to signal
//! halt (or to fail) stops the walk. Faults never escape this layer: an
//! `Err` or a panic inside an entry's logic becomes a 500 response and a
//! halt signal, and the worker carries on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::server::response::write_json_error;

/// Middleware logic: inspects/mutates the context and signals whether the
/// chain should continue (`true`) or stop here (`false`).
pub type Logic = Arc<dyn Fn(&mut RequestContext) -> Result<bool> + Send + Sync>;

/// One registered middleware entry.
///
/// Immutable once registered; the per-invocation options view is applied to
/// the context's transient slot by the engine, never stored back here.
pub struct MiddlewareEntry {
    /// Unique identifier; built-ins use their reserved `@` names
    pub name: Option<String>,
    /// Route pattern restricting which requests the entry runs for
    pub route: String,
    pub logic: Logic,
    /// Opaque configuration handed to the logic at invocation time
    pub options: Option<Value>,
    /// Route pattern compiled as an anchored regex, on first use
    filter_regex: OnceCell<Option<Regex>>,
}

impl MiddlewareEntry {
    pub fn new(
        name: Option<String>,
        route: impl Into<String>,
        logic: Logic,
        options: Option<Value>,
    ) -> Self {
        Self {
            name,
            route: route.into(),
            logic,
            options,
            filter_regex: OnceCell::new(),
        }
    }

    /// Whether this entry runs for the given route filter.
    ///
    /// An empty or `/` route matches everything; otherwise the entry route
    /// must equal the filter (case-insensitively) or match it as a regex
    /// anchored at both ends. `{name}` placeholder segments and a bare `*`
    /// segment in the entry route are widened before compiling, so an entry
    /// registered on `/users/:id` runs for `/users/42`.
    pub fn applies_to(&self, filter: &str) -> bool {
        if self.route.is_empty() || self.route == "/" {
            return true;
        }
        if self.route.eq_ignore_ascii_case(filter) {
            return true;
        }
        let regex = self
            .filter_regex
            .get_or_init(|| Regex::new(&filter_regex_source(&self.route)).ok());
        match regex {
            Some(re) => re.is_match(filter),
            None => false,
        }
    }
}

fn filter_regex_source(route: &str) -> String {
    let widened: Vec<String> = route
        .split('/')
        .map(|seg| {
            if seg == "*" {
                ".*".to_string()
            } else if seg.starts_with('{') && seg.ends_with('}') && seg.len() >= 2 {
                "[^/]+".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect();
    format!("^{}$", widened.join("/"))
}

impl std::fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("options", &self.options)
            .finish()
    }
}

/// Run `entries` against the context, in order.
///
/// With a `route_filter`, the list is first reduced to the stable
/// subsequence of entries whose route applies (registration order is never
/// re-sorted). Returns `true` when every invoked entry signalled continue,
/// `false` as soon as one halts or faults.
pub fn run_chain(
    ctx: &mut RequestContext,
    entries: &[Arc<MiddlewareEntry>],
    route_filter: Option<&str>,
) -> bool {
    if entries.is_empty() {
        return true;
    }

    let selected: Vec<&Arc<MiddlewareEntry>> = match route_filter {
        Some(filter) => entries.iter().filter(|e| e.applies_to(filter)).collect(),
        None => entries.iter().collect(),
    };

    for entry in selected {
        ctx.options = entry.options.clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| (entry.logic)(&mut *ctx)));
        ctx.options = None;

        let keep_going = match outcome {
            Ok(Ok(keep_going)) => keep_going,
            Ok(Err(err)) => {
                error!(
                    name = entry.name.as_deref().unwrap_or("<anonymous>"),
                    error = %err,
                    "Middleware failed"
                );
                write_json_error(&mut ctx.response, 500, json!({ "error": err.to_string() }));
                false
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(
                    name = entry.name.as_deref().unwrap_or("<anonymous>"),
                    error = %detail,
                    "Middleware panicked"
                );
                write_json_error(&mut ctx.response, 500, json!({ "error": detail }));
                false
            }
        };

        if !keep_going {
            debug!(
                name = entry.name.as_deref().unwrap_or("<anonymous>"),
                "Chain halted"
            );
            return false;
        }
    }
    true
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "middleware panicked".to_string()
    }
}

//! Middleware registration and the shared ordered chain.
//!
//! The chain is read on every request by many workers and mutated only by
//! administrative calls, so it is published as an immutable snapshot behind
//! `ArcSwap`; writers serialize on a mutex and republish the whole list.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use arc_swap::ArcSwap;
use serde_json::Value;
use tracing::info;

use super::core::{Logic, MiddlewareEntry};

/// A middleware entry under construction.
///
/// Fields left `None` are filled from defaults at build time; explicit
/// values are never overwritten. Logic is the one mandatory piece.
#[derive(Default)]
pub struct MiddlewareSpec {
    pub name: Option<String>,
    pub route: Option<String>,
    pub logic: Option<Logic>,
    pub options: Option<Value>,
}

impl MiddlewareSpec {
    pub fn new(logic: Logic) -> Self {
        Self {
            name: None,
            route: None,
            logic: Some(logic),
            options: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Build the entry, filling missing name/route from the defaults.
    pub fn into_entry(
        self,
        default_name: Option<&str>,
        default_route: Option<&str>,
    ) -> Result<MiddlewareEntry> {
        let Some(logic) = self.logic else {
            bail!("middleware requires logic");
        };
        let name = self.name.or_else(|| default_name.map(str::to_string));
        let route = self
            .route
            .as_deref()
            .or(default_route)
            .map(normalize_route)
            .unwrap_or_else(|| "/".to_string());
        Ok(MiddlewareEntry::new(name, route, logic, self.options))
    }
}

/// The global ordered middleware chain.
pub struct MiddlewareRegistry {
    chain: ArcSwap<Vec<Arc<MiddlewareEntry>>>,
    write_lock: Mutex<()>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self {
            chain: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Lock-free snapshot of the chain for a request walk.
    pub fn snapshot(&self) -> Arc<Vec<Arc<MiddlewareEntry>>> {
        self.chain.load_full()
    }

    pub fn len(&self) -> usize {
        self.chain.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.load().is_empty()
    }

    /// Build the entry described by `spec` and append it to the chain.
    ///
    /// Fails when the spec carries no logic or when another entry already
    /// holds the same non-empty name; the chain is left untouched on error.
    pub fn register(&self, spec: MiddlewareSpec) -> Result<Arc<MiddlewareEntry>> {
        let entry = Arc::new(spec.into_entry(None, None)?);
        self.append(Arc::clone(&entry))?;
        Ok(entry)
    }

    /// Build the entry without appending it — the "return only" path used
    /// when a caller wants a ready entry to place itself.
    pub fn build(&self, spec: MiddlewareSpec) -> Result<Arc<MiddlewareEntry>> {
        Ok(Arc::new(spec.into_entry(None, None)?))
    }

    /// Convenience registration from a bare closure.
    pub fn register_fn<F>(&self, name: Option<&str>, route: Option<&str>, f: F) -> Result<Arc<MiddlewareEntry>>
    where
        F: Fn(&mut crate::context::RequestContext) -> Result<bool> + Send + Sync + 'static,
    {
        let mut spec = MiddlewareSpec::new(Arc::new(f));
        spec.name = name.map(str::to_string);
        spec.route = route.map(str::to_string);
        self.register(spec)
    }

    /// Remove the entry with the given name, returning it if present.
    pub fn remove(&self, name: &str) -> Option<Arc<MiddlewareEntry>> {
        let _guard = self.write_lock.lock().ok()?;
        let current = self.chain.load_full();
        let pos = current
            .iter()
            .position(|e| e.name.as_deref() == Some(name))?;
        let mut next = Vec::clone(&current);
        let removed = next.remove(pos);
        self.chain.store(Arc::new(next));
        Some(removed)
    }

    /// Resolve a built-in middleware entry, honouring user overrides.
    ///
    /// A pre-registered entry with the built-in's name is removed from the
    /// chain and its logic (and options) substitute the default. The entry
    /// is returned, not re-inserted — the caller decides its position.
    pub fn get_inbuilt(&self, name: &str, default_logic: Logic) -> Arc<MiddlewareEntry> {
        match self.remove(name) {
            Some(existing) => {
                info!(name = %name, "Built-in middleware overridden by registered entry");
                Arc::new(MiddlewareEntry::new(
                    Some(name.to_string()),
                    "/",
                    Arc::clone(&existing.logic),
                    existing.options.clone(),
                ))
            }
            None => Arc::new(MiddlewareEntry::new(
                Some(name.to_string()),
                "/",
                default_logic,
                None,
            )),
        }
    }

    fn append(&self, entry: Arc<MiddlewareEntry>) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("middleware registry lock poisoned"))?;
        let current = self.chain.load_full();
        if let Some(name) = entry.name.as_deref() {
            if !name.is_empty()
                && current.iter().any(|e| e.name.as_deref() == Some(name))
            {
                bail!("middleware named `{name}` is already registered");
            }
        }
        let mut next = Vec::clone(&current);
        next.push(entry);
        self.chain.store(Arc::new(next));
        Ok(())
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonicalize a middleware/route registration path.
///
/// Strips any query-string portion, collapses duplicate and trailing
/// slashes, and rewrites bare `:name` placeholder tokens into the matcher's
/// `{name}` form. An empty route becomes `/`.
pub fn normalize_route(route: &str) -> String {
    let mut route = route.trim();
    if let Some(pos) = route.find('?') {
        route = &route[..pos];
    }
    let segments: Vec<String> = route
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => seg.to_string(),
        })
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

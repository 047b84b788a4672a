//! `@public` — static file resolution and cache-control policy.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::config::{CacheConfig, StaticConfig};
use crate::pipeline::Logic;
use crate::server::response::write_file_response;

/// Cache-control eligibility rules for served files.
///
/// A path is cached only when caching is enabled, it does not match the
/// exclude pattern, and — when an include pattern is configured — it
/// matches the include pattern.
#[derive(Debug)]
pub struct CachePolicy {
    pub enabled: bool,
    pub max_age: u64,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_age: 0,
            include: None,
            exclude: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let include = config
            .include
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid cache include pattern")?;
        let exclude = config
            .exclude
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid cache exclude pattern")?;
        Ok(Self {
            enabled: config.enabled,
            max_age: config.max_age,
            include,
            exclude,
        })
    }

    pub fn eligible(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path) {
                return false;
            }
        }
        match &self.include {
            Some(include) => include.is_match(path),
            None => true,
        }
    }
}

/// Static content resolver over one or more root directories.
pub struct StaticFiles {
    roots: Vec<PathBuf>,
    defaults: Vec<String>,
    cache: CachePolicy,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            roots: vec![root.into()],
            defaults: vec!["index.html".to_string()],
            cache: CachePolicy::disabled(),
        }
    }

    pub fn from_config(static_config: &StaticConfig, cache_config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            roots: static_config.roots.clone(),
            defaults: static_config.defaults.clone(),
            cache: CachePolicy::from_config(cache_config)?,
        })
    }

    pub fn cache(&self) -> &CachePolicy {
        &self.cache
    }

    pub fn set_cache(&mut self, cache: CachePolicy) {
        self.cache = cache;
    }

    /// Map a URL path under a root, rejecting traversal components.
    fn map_path(&self, root: &Path, url_path: &str) -> Option<PathBuf> {
        let mut pb = root.to_path_buf();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Find the file a request path refers to, probing the roots in order.
    /// Directory hits fall back to the configured default documents.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let Some(candidate) = self.map_path(root, url_path) else {
                continue;
            };
            if candidate.is_file() {
                return Some(candidate);
            }
            if candidate.is_dir() {
                for default in &self.defaults {
                    let fallback = candidate.join(default);
                    if fallback.is_file() {
                        return Some(fallback);
                    }
                }
            }
        }
        None
    }

    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "ico" => "image/x-icon",
            _ => "application/octet-stream",
        }
    }
}

/// Build the `@public` logic over a shared resolver.
///
/// A miss defers to the rest of the chain; a hit writes the file (with the
/// caching header when eligible) and short-circuits — static content fully
/// satisfies the request.
pub fn public_logic(files: Arc<StaticFiles>) -> Logic {
    Arc::new(move |ctx| {
        let Some(path) = files.resolve(&ctx.path) else {
            return Ok(true);
        };
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read static file {}", path.display()))?;
        let max_age = files
            .cache()
            .eligible(&ctx.path)
            .then_some(files.cache().max_age);
        debug!(path = %ctx.path, file = %path.display(), cached = max_age.is_some(), "Static file served");
        write_file_response(
            &mut ctx.response,
            bytes,
            StaticFiles::content_type(&path),
            max_age,
        );
        Ok(false)
    })
}

//! File-based pipeline configuration.
//!
//! Everything the built-in middleware consumes from the outside world lives
//! here: static-content roots and cache policy, access allow/deny lists and
//! rate-limit rules. Loaded once from YAML at startup; the derived runtime
//! stores (access policy, limiter, static resolver) are built from this and
//! shared read-only with the request workers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub static_files: StaticConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub limits: Vec<LimitRuleConfig>,
}

#[derive(Debug, Deserialize)]
pub struct StaticConfig {
    /// Directories probed in order for static content
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    /// Default documents tried when a request maps to a directory
    #[serde(default = "default_documents")]
    pub defaults: Vec<String>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            defaults: default_documents(),
        }
    }
}

fn default_documents() -> Vec<String> {
    vec!["index.html".to_string()]
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `max-age` value written into `Cache-Control` for eligible files
    #[serde(default = "default_max_age")]
    pub max_age: u64,
    /// Regex a path must match to be cached (applies only when set)
    pub include: Option<String>,
    /// Regex that exempts matching paths from caching
    pub exclude: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age: default_max_age(),
            include: None,
            exclude: None,
        }
    }
}

fn default_max_age() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Default)]
pub struct AccessConfig {
    /// When non-empty, the only addresses admitted
    #[serde(default)]
    pub allow: Vec<String>,
    /// Addresses rejected outright
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitRuleConfig {
    /// IP or CIDR subnet the rule applies to
    pub address: String,
    /// Requests admitted per window
    pub requests: u64,
    /// Window length, e.g. `30s`, `5m`, `1h`
    pub period: String,
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read config file {}", path.as_ref().display())
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("invalid pipeline configuration")
    }
}

/// Parses a period string like "30s", "5m", "1h" into a Duration.
pub fn parse_period(s: &str) -> Result<Duration> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        bail!("empty period");
    };
    let value: u64 = s[..s.len() - 1]
        .parse()
        .with_context(|| format!("invalid number in period `{s}`"))?;

    match unit {
        's' => Ok(Duration::from_secs(value)),
        'm' => Ok(Duration::from_secs(value * 60)),
        'h' => Ok(Duration::from_secs(value * 3600)),
        _ => bail!("invalid period unit in `{s}` (expected s, m or h)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_period("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_period("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_period("").is_err());
        assert!(parse_period("10x").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml("{}").unwrap();
        assert!(config.static_files.roots.is_empty());
        assert_eq!(config.static_files.defaults, vec!["index.html"]);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_age, 3600);
        assert!(config.access.allow.is_empty());
        assert!(config.limits.is_empty());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
static_files:
  roots: ["public", "assets"]
  defaults: ["index.html", "default.html"]
cache:
  enabled: true
  max_age: 120
  include: '.*\.css$'
  exclude: '.*\.min\.css$'
access:
  deny: ["10.0.0.0/24"]
limits:
  - address: "192.168.0.0/16"
    requests: 100
    period: "1m"
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.static_files.roots.len(), 2);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_age, 120);
        assert_eq!(config.access.deny, vec!["10.0.0.0/24"]);
        assert_eq!(config.limits[0].requests, 100);
    }
}

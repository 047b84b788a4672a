//! `@limit` — windowed per-IP/subnet rate limiting.
//!
//! Each rule owns one counter: an exact-IP rule counts that address, a
//! subnet rule counts every address it contains against the same shared
//! budget. When an address matches several rules the most specific one
//! applies — an exact rule beats any subnet, a longer prefix beats a
//! shorter one.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::json;
use tracing::{info, warn};

use crate::config::{parse_period, LimitRuleConfig};
use crate::ip::IpRule;
use crate::pipeline::Logic;
use crate::server::response::write_json_error;

#[derive(Debug, Clone)]
struct LimitRule {
    rule: IpRule,
    limit: u64,
    window: Duration,
}

struct Window {
    count: u64,
    started: Instant,
    period: Duration,
}

/// Request-count store for the configured limit rules.
///
/// Counters live in a concurrent map keyed by rule; per-key updates take
/// the entry's mutex so parallel requests to the same key never lose an
/// increment.
pub struct RateLimiter {
    rules: Vec<LimitRule>,
    counters: DashMap<String, Mutex<Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            counters: DashMap::new(),
        }
    }

    pub fn from_config(configs: &[LimitRuleConfig]) -> anyhow::Result<Self> {
        let mut limiter = Self::new();
        for config in configs {
            limiter.add_rule(
                IpRule::parse(&config.address)?,
                config.requests,
                parse_period(&config.period)?,
            );
        }
        Ok(limiter)
    }

    pub fn add_rule(&mut self, rule: IpRule, limit: u64, window: Duration) {
        info!(rule = %rule, limit, window_secs = window.as_secs(), "Rate limit rule added");
        self.rules.push(LimitRule { rule, limit, window });
    }

    /// Count one request from `addr` against its governing rule.
    ///
    /// Returns `false` when the rule's budget for the current window is
    /// exhausted. Addresses matched by no rule are always admitted.
    pub fn check_and_update(&self, addr: IpAddr) -> bool {
        let Some(rule) = self.match_rule(addr) else {
            return true;
        };

        let entry = self
            .counters
            .entry(rule.rule.to_string())
            .or_insert_with(|| {
                Mutex::new(Window {
                    count: 0,
                    started: Instant::now(),
                    period: rule.window,
                })
            });
        let Ok(mut window) = entry.lock() else {
            return true;
        };
        if window.started.elapsed() >= window.period {
            window.count = 0;
            window.started = Instant::now();
        }
        window.count += 1;
        window.count <= rule.limit
    }

    /// Drop counters whose window has fully elapsed; they would reset on
    /// the next hit anyway, this just bounds memory between hits.
    pub fn cleanup_expired(&self) {
        let before = self.counters.len();
        self.counters
            .retain(|_, window| match window.get_mut() {
                Ok(w) => w.started.elapsed() < w.period,
                Err(_) => false,
            });
        let removed = before - self.counters.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired rate limit counters");
        }
    }

    /// Current number of live counters, for monitoring.
    pub fn active_counters(&self) -> usize {
        self.counters.len()
    }

    fn match_rule(&self, addr: IpAddr) -> Option<&LimitRule> {
        self.rules
            .iter()
            .filter(|r| r.rule.contains(addr))
            .max_by_key(|r| r.rule.specificity())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `@limit` logic over a shared limiter.
pub fn limit_logic(limiter: Arc<RateLimiter>) -> Logic {
    Arc::new(move |ctx| {
        if limiter.check_and_update(ctx.remote_addr) {
            Ok(true)
        } else {
            warn!(remote_addr = %ctx.remote_addr, path = %ctx.path, "Rate limit exceeded");
            write_json_error(
                &mut ctx.response,
                429,
                json!({ "error": "Too Many Requests" }),
            );
            Ok(false)
        }
    })
}

//! `@access` — allow/deny source-address policy.

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::config::AccessConfig;
use crate::ip::IpRule;
use crate::pipeline::Logic;
use crate::server::response::write_json_error;

/// Configured allow/deny rule set.
///
/// Deny rules always win. Without an allow list, unlisted addresses are
/// permitted; once an allow list exists it becomes the only admitted set.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    allow: Vec<IpRule>,
    deny: Vec<IpRule>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AccessConfig) -> anyhow::Result<Self> {
        let mut policy = Self::new();
        for entry in &config.allow {
            policy.allow(IpRule::parse(entry)?);
        }
        for entry in &config.deny {
            policy.deny(IpRule::parse(entry)?);
        }
        Ok(policy)
    }

    pub fn allow(&mut self, rule: IpRule) {
        self.allow.push(rule);
    }

    pub fn deny(&mut self, rule: IpRule) {
        self.deny.push(rule);
    }

    pub fn permits(&self, addr: IpAddr) -> bool {
        if self.deny.iter().any(|rule| rule.contains(addr)) {
            return false;
        }
        if self.allow.is_empty() {
            return true;
        }
        self.allow.iter().any(|rule| rule.contains(addr))
    }
}

/// Build the `@access` logic over a shared policy.
pub fn access_logic(policy: Arc<AccessPolicy>) -> Logic {
    Arc::new(move |ctx| {
        if policy.permits(ctx.remote_addr) {
            Ok(true)
        } else {
            warn!(remote_addr = %ctx.remote_addr, path = %ctx.path, "Access denied");
            write_json_error(&mut ctx.response, 403, json!({ "error": "Forbidden" }));
            Ok(false)
        }
    })
}

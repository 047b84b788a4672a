use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::error;

use super::request::{parse_request, RawRequest};
use super::response::write_json_error;
use crate::config::PipelineConfig;
use crate::context::{RequestContext, Response};
use crate::middleware::{
    access_logic, body_logic, limit_logic, names, public_logic, query_logic, route_valid_logic,
    AccessPolicy, RateLimiter, StaticFiles,
};
use crate::pipeline::{run_chain, MiddlewareEntry, MiddlewareRegistry};
use crate::router::Router;

/// The assembled request pipeline.
///
/// Owns the built-in chain (wired once at construction, in order: access,
/// limit, public, body, query, route-valid) and drives each request through
/// built-ins, user-registered middleware and finally the resolved route's
/// logic. Built-in behaviour is replaced by registering an entry under the
/// built-in's reserved name *before* constructing the service.
pub struct AppService {
    router: Arc<Router>,
    registry: Arc<MiddlewareRegistry>,
    builtins: Vec<Arc<MiddlewareEntry>>,
    limiter: Arc<RateLimiter>,
}

impl AppService {
    pub fn new(
        config: &PipelineConfig,
        router: Arc<Router>,
        registry: Arc<MiddlewareRegistry>,
    ) -> Result<Self> {
        let access = Arc::new(AccessPolicy::from_config(&config.access)?);
        let limiter = Arc::new(RateLimiter::from_config(&config.limits)?);
        let statics = Arc::new(StaticFiles::from_config(
            &config.static_files,
            &config.cache,
        )?);

        let builtins = vec![
            registry.get_inbuilt(names::ACCESS, access_logic(access)),
            registry.get_inbuilt(names::LIMIT, limit_logic(Arc::clone(&limiter))),
            registry.get_inbuilt(names::PUBLIC, public_logic(statics)),
            registry.get_inbuilt(names::BODY, body_logic()),
            registry.get_inbuilt(names::QUERY, query_logic()),
            registry.get_inbuilt(names::ROUTE_VALID, route_valid_logic(Arc::clone(&router))),
        ];

        Ok(Self {
            router,
            registry,
            builtins,
            limiter,
        })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<MiddlewareRegistry> {
        &self.registry
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Drive one request through the pipeline and hand back the finished
    /// response.
    pub fn handle(&self, raw: RawRequest) -> Response {
        let mut ctx = match parse_request(raw) {
            Ok(ctx) => ctx,
            Err(err) => {
                let mut response = Response::new();
                write_json_error(&mut response, 400, json!({ "error": err.to_string() }));
                return response;
            }
        };

        let user_entries = self.registry.snapshot();
        let mut entries = Vec::with_capacity(self.builtins.len() + user_entries.len());
        entries.extend(self.builtins.iter().cloned());
        entries.extend(user_entries.iter().cloned());

        let filter = ctx.path.clone();
        if run_chain(&mut ctx, &entries, Some(&filter)) {
            self.dispatch(&mut ctx);
        }
        ctx.into_response()
    }

    /// Execute the resolved route's logic. Faults are absorbed here the
    /// same way the chain absorbs middleware faults: 500, never rethrown.
    fn dispatch(&self, ctx: &mut RequestContext) {
        // An overridden @route-valid may let the chain complete without
        // resolving a route; there is nothing to dispatch then.
        let Some(route) = ctx.route.clone() else {
            return;
        };
        let Some(logic) = route.logic.clone() else {
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| logic(&mut *ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(path = %ctx.path, error = %err, "Route logic failed");
                write_json_error(&mut ctx.response, 500, json!({ "error": err.to_string() }));
            }
            Err(panic) => {
                let detail = crate::pipeline::panic_message(panic.as_ref());
                error!(path = %ctx.path, error = %detail, "Route logic panicked");
                write_json_error(&mut ctx.response, 500, json!({ "error": detail }));
            }
        }
    }
}

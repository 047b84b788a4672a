//! `@route-valid` — route resolution and parameter binding.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::pipeline::Logic;
use crate::router::Router;
use crate::server::response::write_json_error;

/// Build the `@route-valid` logic over the shared route table.
///
/// A request with no matching route — or a matching route that carries no
/// logic — is answered with 404 and halts the chain. On a hit the extracted
/// path parameters are bound onto the context and the route is attached for
/// the dispatch step.
pub fn route_valid_logic(router: Arc<Router>) -> Logic {
    Arc::new(move |ctx| {
        let found = router.route(&ctx.method, &ctx.path, &ctx.protocol, &ctx.endpoint);
        let Some(matched) = found.filter(|m| m.route.logic.is_some()) else {
            warn!(method = %ctx.method, path = %ctx.path, "No route for request");
            write_json_error(
                &mut ctx.response,
                404,
                json!({
                    "error": "Not Found",
                    "method": ctx.method.as_str(),
                    "path": ctx.path,
                }),
            );
            return Ok(false);
        };

        for (name, value) in &matched.path_params {
            ctx.params.insert(name.to_string(), value.clone());
        }
        ctx.route = Some(Arc::clone(&matched.route));
        Ok(true)
    })
}

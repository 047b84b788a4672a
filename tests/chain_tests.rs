use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use gantry::pipeline::{run_chain, MiddlewareRegistry, MiddlewareSpec};
use gantry::RequestContext;
use http::Method;

const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

#[test]
fn test_registered_chain_runs_in_order_with_filter() {
    let registry = MiddlewareRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for (name, route) in [
        ("everywhere", "/"),
        ("api-only", "/api/.*"),
        ("admin-only", "/admin"),
    ] {
        let seen = Arc::clone(&seen);
        registry
            .register_fn(Some(name), Some(route), move |_ctx| {
                seen.lock().unwrap().push(name);
                Ok(true)
            })
            .unwrap();
    }

    let chain = registry.snapshot();
    let mut ctx = RequestContext::new(Method::GET, "/api/users", ADDR);
    assert!(run_chain(&mut ctx, &chain, Some("/api/users")));
    assert_eq!(*seen.lock().unwrap(), vec!["everywhere", "api-only"]);
}

#[test]
fn test_halting_entry_stops_later_entries() {
    let registry = MiddlewareRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = Arc::clone(&seen);
        registry
            .register_fn(Some("gate"), None, move |ctx| {
                seen.lock().unwrap().push("gate");
                ctx.response.set_status(403);
                Ok(false)
            })
            .unwrap();
    }
    {
        let seen = Arc::clone(&seen);
        registry
            .register_fn(Some("after"), None, move |_ctx| {
                seen.lock().unwrap().push("after");
                Ok(true)
            })
            .unwrap();
    }

    let chain = registry.snapshot();
    let mut ctx = RequestContext::new(Method::GET, "/", ADDR);
    assert!(!run_chain(&mut ctx, &chain, None));
    assert_eq!(ctx.response.status, 403);
    assert_eq!(*seen.lock().unwrap(), vec!["gate"]);
}

#[test]
fn test_duplicate_named_registration_keeps_first() {
    let registry = MiddlewareRegistry::new();
    registry
        .register_fn(Some("audit"), None, |_ctx| Ok(true))
        .unwrap();
    assert!(registry
        .register_fn(Some("audit"), None, |_ctx| Ok(true))
        .is_err());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_inbuilt_override_yields_single_entry_with_new_logic() {
    let registry = MiddlewareRegistry::new();
    registry
        .register_fn(Some("@limit"), None, |ctx| {
            ctx.response.set_status(451);
            Ok(false)
        })
        .unwrap();

    let entry = registry.get_inbuilt("@limit", Arc::new(|_ctx| Ok(true)));

    // Exactly one entry carries the name: the override left the chain and
    // lives on in the returned entry.
    assert!(registry.is_empty());
    assert_eq!(entry.name.as_deref(), Some("@limit"));

    let mut ctx = RequestContext::new(Method::GET, "/", ADDR);
    assert!(!run_chain(&mut ctx, &[entry], None));
    assert_eq!(ctx.response.status, 451);
}

#[test]
fn test_spec_built_entry_carries_options() {
    let registry = MiddlewareRegistry::new();
    let spec = MiddlewareSpec::new(Arc::new(|ctx: &mut RequestContext| {
        let limit = ctx
            .options
            .as_ref()
            .and_then(|o| o.get("limit"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok(limit > 10)
    }))
    .named("tunable")
    .with_options(serde_json::json!({ "limit": 50 }));

    registry.register(spec).unwrap();
    let chain = registry.snapshot();
    let mut ctx = RequestContext::new(Method::GET, "/", ADDR);
    assert!(run_chain(&mut ctx, &chain, None));
    assert!(ctx.options.is_none());
}

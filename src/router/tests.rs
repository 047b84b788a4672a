use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use http::Method;

use super::core::{PathPattern, Route, RouteLogic, Router};

fn noop_logic() -> RouteLogic {
    Arc::new(|_ctx| Ok(()))
}

const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

#[test]
fn test_root_path() {
    let pattern = PathPattern::parse("/").unwrap();
    assert!(pattern.is_root());
    assert!(pattern.matches("/").is_some());
    assert!(pattern.matches("/other").is_none());
}

#[test]
fn test_parameterized_path() {
    let pattern = PathPattern::parse("/items/{id}").unwrap();
    let params = pattern.matches("/items/123").unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].0.as_ref(), "id");
    assert_eq!(params[0].1, "123");
}

#[test]
fn test_colon_placeholder_form() {
    let pattern = PathPattern::parse("/users/:id").unwrap();
    let params = pattern.matches("/users/42").unwrap();
    assert_eq!(params[0].0.as_ref(), "id");
    assert_eq!(params[0].1, "42");
}

#[test]
fn test_nested_path() {
    let pattern = PathPattern::parse("/a/{b}/c").unwrap();
    assert!(pattern.matches("/a/1/c").is_some());
    assert!(pattern.matches("/a/1").is_none());
    assert!(pattern.matches("/a/1/c/d").is_none());
}

#[test]
fn test_trailing_wildcard_captures_remainder() {
    let pattern = PathPattern::parse("/files/*").unwrap();
    let params = pattern.matches("/files/a/b/c").unwrap();
    assert_eq!(params[0].0.as_ref(), "*");
    assert_eq!(params[0].1, "a/b/c");

    let empty = pattern.matches("/files").unwrap();
    assert_eq!(empty[0].1, "");
}

#[test]
fn test_interior_wildcard_rejected() {
    assert!(PathPattern::parse("/files/*/deep").is_err());
}

#[test]
fn test_empty_placeholder_rejected() {
    assert!(PathPattern::parse("/items/{}").is_err());
}

#[test]
fn test_pattern_canonicalizes_raw() {
    let pattern = PathPattern::parse("//items//{id}/").unwrap();
    assert_eq!(pattern.raw(), "/items/{id}");
}

#[test]
fn test_router_binds_params() {
    let router = Router::new();
    assert!(router.is_empty());
    router.add_route(Route::new(Some(Method::GET), "/users/{id}", noop_logic()).unwrap());
    assert_eq!(router.len(), 1);

    let m = router.route(&Method::GET, "/users/42", "http", "").unwrap();
    assert_eq!(m.get_path_param("id"), Some("42"));
    assert!(m.wildcard().is_none());
}

#[test]
fn test_exact_method_beats_wildcard_method() {
    let router = Router::new();
    let any: RouteLogic = Arc::new(|ctx| {
        ctx.response.set_status(201);
        Ok(())
    });
    router.add_route(Route::new(None, "/things", any).unwrap());
    router.add_route(Route::new(Some(Method::GET), "/things", noop_logic()).unwrap());

    let m = router.route(&Method::GET, "/things", "http", "").unwrap();
    assert_eq!(m.route.method, Some(Method::GET));

    // A verb with no exact route falls back to the wildcard-method route.
    let m = router.route(&Method::DELETE, "/things", "http", "").unwrap();
    assert!(m.route.method.is_none());
}

#[test]
fn test_protocol_restriction() {
    let router = Router::new();
    let mut route = Route::new(Some(Method::GET), "/secure", noop_logic()).unwrap();
    route.protocol = Some("https".to_string());
    router.add_route(route);

    assert!(router.route(&Method::GET, "/secure", "http", "").is_none());
    assert!(router.route(&Method::GET, "/secure", "HTTPS", "").is_some());
}

#[test]
fn test_endpoint_restriction() {
    let router = Router::new();
    let mut route = Route::new(Some(Method::GET), "/admin", noop_logic()).unwrap();
    route.endpoint = Some("internal".to_string());
    router.add_route(route);

    assert!(router.route(&Method::GET, "/admin", "http", "public").is_none());
    assert!(router.route(&Method::GET, "/admin", "http", "internal").is_some());
}

#[test]
fn test_registration_order_precedence() {
    let router = Router::new();
    router.add_route(Route::new(Some(Method::GET), "/pets/{id}", noop_logic()).unwrap());
    router.add_route(Route::new(Some(Method::GET), "/pets/special", noop_logic()).unwrap());

    // First registration wins when two patterns cover the same path.
    let m = router.route(&Method::GET, "/pets/special", "http", "").unwrap();
    assert_eq!(m.route.pattern.raw(), "/pets/{id}");
}

#[test]
fn test_route_logic_runs_against_context() {
    let logic: RouteLogic = Arc::new(|ctx| {
        let id = ctx.param("id").unwrap_or("unknown").to_string();
        ctx.response.body_vec(id.into_bytes());
        Ok(())
    });
    let router = Router::new();
    router.add_route(Route::new(Some(Method::GET), "/users/{id}", logic).unwrap());

    let m = router.route(&Method::GET, "/users/7", "http", "").unwrap();
    let mut ctx = crate::context::RequestContext::new(Method::GET, "/users/7", ADDR);
    for (k, v) in &m.path_params {
        ctx.params.insert(k.to_string(), v.clone());
    }
    m.route.logic.as_ref().unwrap()(&mut ctx).unwrap();
    assert_eq!(ctx.response.body, b"7");
}

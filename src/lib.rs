//! # Gantry
//!
//! **Gantry** is the request-processing pipeline of a web server: an ordered
//! chain of middleware that inspects, transforms or short-circuits an
//! inbound request before it reaches route logic, plus the built-ins that
//! implement access control, rate limiting, static-file serving, body/query
//! decoding and route resolution.
//!
//! ## Architecture
//!
//! - **[`pipeline`]** - The middleware chain: entry type, execution engine
//!   and registry. Entries run strictly in registration order; the first to
//!   signal halt stops the walk, and faults are absorbed as 500 responses.
//! - **[`router`]** - Path matching and route resolution using patterns
//!   compiled once at registration (literals, `{name}` placeholders, a
//!   trailing `*` wildcard).
//! - **[`middleware`]** - The built-ins, each overridable by pre-registering
//!   an entry under its reserved name (`@access`, `@limit`, `@public`,
//!   `@body`, `@query`, `@route-valid`).
//! - **[`server`]** - Boundary types: the raw request handed in by the
//!   listener, response writers, and [`server::AppService`] which drives the
//!   whole pipeline for one request.
//! - **[`config`]** / **[`runtime_config`]** - File-based pipeline
//!   configuration and env-based runtime tuning.
//! - **[`worker_pool`]** - Bounded worker threads draining a request queue
//!   into the service.
//!
//! Everything the chain shares between workers (the chain itself, the route
//! table, access and limit rules) is published as immutable snapshots;
//! registration is a copy-and-swap, so request workers never observe a
//! partially updated list. The per-request context belongs to exactly one
//! worker.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gantry::config::PipelineConfig;
//! use gantry::pipeline::MiddlewareRegistry;
//! use gantry::router::{Route, Router};
//! use gantry::server::{AppService, RawRequest};
//!
//! let config = PipelineConfig::from_file("pipeline.yaml").unwrap();
//! let router = Arc::new(Router::new());
//! router.add_route(
//!     Route::new(Some(http::Method::GET), "/users/{id}", Arc::new(|ctx| {
//!         let id = ctx.param("id").unwrap_or("unknown").to_string();
//!         ctx.response.body_vec(id.into_bytes());
//!         Ok(())
//!     }))
//!     .unwrap(),
//! );
//!
//! let registry = Arc::new(MiddlewareRegistry::new());
//! let service = AppService::new(&config, router, registry).unwrap();
//!
//! let raw = RawRequest::new("GET", "/users/42", "203.0.113.7".parse().unwrap());
//! let response = service.handle(raw);
//! assert_eq!(response.status, 200);
//! ```

pub mod config;
pub mod context;
pub mod ip;
pub mod middleware;
pub mod pipeline;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod worker_pool;

pub use context::{RequestContext, Response, UploadedFile};
pub use ip::IpRule;
pub use pipeline::{run_chain, Logic, MiddlewareEntry, MiddlewareRegistry, MiddlewareSpec};
pub use router::{PathPattern, Route, RouteMatch, Router};
pub use server::{AppService, RawRequest};

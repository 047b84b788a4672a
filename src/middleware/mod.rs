//! Built-in pipeline middleware.
//!
//! Each built-in is a [`crate::pipeline::Logic`] constructor; the service
//! wires them into the chain (in order: access, limit, public, body, query,
//! route-valid) through [`crate::pipeline::MiddlewareRegistry::get_inbuilt`],
//! so pre-registering an entry under one of the reserved names replaces the
//! default behaviour.

mod access;
mod body;
mod limit;
mod public;
mod query;
mod route_valid;

pub use access::{access_logic, AccessPolicy};
pub use body::body_logic;
pub use limit::{limit_logic, RateLimiter};
pub use public::{public_logic, CachePolicy, StaticFiles};
pub use query::query_logic;
pub use route_valid::route_valid_logic;

/// Reserved names of the built-in middleware entries.
pub mod names {
    pub const ACCESS: &str = "@access";
    pub const LIMIT: &str = "@limit";
    pub const PUBLIC: &str = "@public";
    pub const BODY: &str = "@body";
    pub const QUERY: &str = "@query";
    pub const ROUTE_VALID: &str = "@route-valid";
}

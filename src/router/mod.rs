//! Route matching: compiled path patterns and the route table.

mod core;

#[cfg(test)]
mod tests;

pub use core::{
    ParamVec, PathPattern, PatternToken, Route, RouteLogic, RouteMatch, Router,
    MAX_INLINE_PARAMS,
};

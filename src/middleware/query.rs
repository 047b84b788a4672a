//! `@query` — query-string decoding.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::warn;

use crate::pipeline::Logic;
use crate::server::response::write_json_error;

/// Build the `@query` logic.
///
/// Converts the raw query string into the context's query map; duplicate
/// keys keep the last value. Decoding failure is reported as a 400 and
/// halts the chain.
pub fn query_logic() -> Logic {
    Arc::new(|ctx| {
        let Some(raw) = ctx.raw_query.clone() else {
            return Ok(true);
        };
        match decode_query(&raw) {
            Ok(query) => {
                ctx.query = query;
                Ok(true)
            }
            Err(err) => {
                warn!(path = %ctx.path, error = %err, "Query string rejected");
                write_json_error(&mut ctx.response, 400, json!({ "error": err.to_string() }));
                Ok(false)
            }
        }
    })
}

fn decode_query(raw: &str) -> Result<HashMap<String, Value>> {
    let mut query = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(query)
}

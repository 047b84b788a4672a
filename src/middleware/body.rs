//! `@body` — request payload decoding by declared content type.
//!
//! Supported types: `application/json`, `application/x-www-form-urlencoded`,
//! `text/*` and `multipart/form-data` (fields plus file uploads). A payload
//! with any other declared type is left undecoded on the context; only a
//! declared-but-malformed payload produces a 400.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::context::{RequestContext, UploadedFile};
use crate::pipeline::Logic;
use crate::server::response::write_json_error;

/// Build the `@body` logic.
pub fn body_logic() -> Logic {
    Arc::new(|ctx| {
        if ctx.raw_body.is_empty() {
            return Ok(true);
        }
        match decode_body(ctx) {
            Ok(None) => Ok(true),
            Ok(Some((data, files))) => {
                debug!(
                    content_type = ctx.content_type().unwrap_or(""),
                    files = files.len(),
                    "Request body decoded"
                );
                ctx.body_data = Some(data);
                ctx.files = files;
                Ok(true)
            }
            Err(err) => {
                warn!(path = %ctx.path, error = %err, "Request body rejected");
                write_json_error(&mut ctx.response, 400, json!({ "error": err.to_string() }));
                Ok(false)
            }
        }
    })
}

fn decode_body(ctx: &RequestContext) -> Result<Option<(Value, Vec<UploadedFile>)>> {
    let content_type = ctx.content_type().unwrap_or("");
    let main_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match main_type.as_str() {
        "application/json" => {
            let value: Value =
                serde_json::from_slice(&ctx.raw_body).context("malformed JSON body")?;
            Ok(Some((value, Vec::new())))
        }
        "application/x-www-form-urlencoded" => {
            let value = decode_urlencoded(&ctx.raw_body);
            Ok(Some((value, Vec::new())))
        }
        "multipart/form-data" => {
            let boundary = boundary_param(content_type)
                .ok_or_else(|| anyhow!("multipart body without boundary"))?;
            let (value, files) = decode_multipart(&ctx.raw_body, boundary)?;
            Ok(Some((value, files)))
        }
        t if t.starts_with("text/") => {
            let text =
                std::str::from_utf8(&ctx.raw_body).context("text body is not valid UTF-8")?;
            Ok(Some((Value::String(text.to_string()), Vec::new())))
        }
        _ => Ok(None),
    }
}

fn decode_urlencoded(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Value::Object(map)
}

fn boundary_param(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"'))
        .filter(|b| !b.is_empty())
}

fn decode_multipart(body: &[u8], boundary: &str) -> Result<(Value, Vec<UploadedFile>)> {
    let delimiter = format!("--{boundary}");
    let mut fields = Map::new();
    let mut files = Vec::new();

    for part in split_parts(body, delimiter.as_bytes()) {
        let (header_block, content) = split_part(part)?;
        let headers = parse_part_headers(header_block)?;

        let disposition = headers
            .get("content-disposition")
            .ok_or_else(|| anyhow!("multipart part without Content-Disposition"))?;
        let name = disposition_param(disposition, "name")
            .ok_or_else(|| anyhow!("multipart part without a field name"))?;

        match disposition_param(disposition, "filename") {
            Some(filename) => files.push(UploadedFile {
                field: name.to_string(),
                filename: filename.to_string(),
                content_type: headers
                    .get("content-type")
                    .cloned()
                    .unwrap_or_default(),
                data: content.to_vec(),
            }),
            None => {
                let text = std::str::from_utf8(content)
                    .context("multipart field is not valid UTF-8")?;
                fields.insert(name.to_string(), Value::String(text.to_string()));
            }
        }
    }

    Ok((Value::Object(fields), files))
}

/// Slice the raw body into parts between boundary delimiters, dropping the
/// preamble and the closing `--` marker.
fn split_parts<'a>(body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = body;
    let mut saw_delimiter = false;

    while let Some(pos) = find_subsequence(rest, delimiter) {
        if saw_delimiter {
            parts.push(trim_crlf(&rest[..pos]));
        }
        saw_delimiter = true;
        rest = &rest[pos + delimiter.len()..];
        if rest.starts_with(b"--") {
            break;
        }
    }
    parts
}

fn split_part(part: &[u8]) -> Result<(&[u8], &[u8])> {
    let pos = find_subsequence(part, b"\r\n\r\n")
        .ok_or_else(|| anyhow!("multipart part without header terminator"))?;
    Ok((&part[..pos], trim_crlf(&part[pos + 4..])))
}

fn parse_part_headers(block: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(block).context("multipart headers are not valid UTF-8")?;
    let mut headers = HashMap::new();
    for line in text.split("\r\n").filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| anyhow!("malformed multipart header `{line}`"))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(headers)
}

fn disposition_param<'a>(disposition: &'a str, key: &str) -> Option<&'a str> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix(&format!("{key}=")))
        .map(|v| v.trim_matches('"'))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_crlf(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(b"\r\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r\n").unwrap_or(bytes)
}

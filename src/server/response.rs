use serde_json::Value;

use crate::context::Response;

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

pub fn write_json_error(res: &mut Response, status: u16, body: Value) {
    res.set_status(status);
    res.set_header("Content-Type", "application/json");
    res.body_vec(body.to_string().into_bytes());
}

/// Write a static-file hit: body, content type and, when a max-age is
/// given, the caching header.
pub fn write_file_response(
    res: &mut Response,
    bytes: Vec<u8>,
    content_type: &str,
    cache_max_age: Option<u64>,
) {
    res.set_status(200);
    res.set_header("Content-Type", content_type);
    if let Some(max_age) = cache_max_age {
        res.set_header("Cache-Control", format!("public, max-age={max_age}"));
    }
    res.body_vec(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(403), "Forbidden");
        assert_eq!(status_reason(429), "Too Many Requests");
        assert_eq!(status_reason(404), "Not Found");
    }

    #[test]
    fn test_write_json_error() {
        let mut res = Response::new();
        write_json_error(&mut res, 404, json!({ "error": "Not Found" }));
        assert_eq!(res.status, 404);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        let body: Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(body["error"], "Not Found");
    }

    #[test]
    fn test_write_file_response_with_cache() {
        let mut res = Response::new();
        write_file_response(&mut res, b"body { }".to_vec(), "text/css", Some(120));
        assert_eq!(res.status, 200);
        assert_eq!(res.header("Cache-Control"), Some("public, max-age=120"));
    }

    #[test]
    fn test_write_file_response_without_cache() {
        let mut res = Response::new();
        write_file_response(&mut res, b"x".to_vec(), "text/plain", None);
        assert!(res.header("Cache-Control").is_none());
    }
}

//! Response body handling: bounded reads and JSON-or-text decoding.

use crate::error::{HttpToolsError, Result};
use base64::Engine as _;
use mime::Mime;
use serde_json::{Value, json};

/// Read a response body, failing once it grows past `max_bytes`.
///
/// # Errors
///
/// Returns [`HttpToolsError::TooLarge`] when the body exceeds the limit and
/// [`HttpToolsError::Transport`] when reading the stream fails.
pub async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response.bytes().await?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(HttpToolsError::TooLarge(format!(
            "{len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(HttpToolsError::TooLarge(format!("exceeded {max} bytes")));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(m) = content_type.and_then(|ct| ct.parse::<Mime>().ok()) else {
        return false;
    };
    m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
}

/// Decode a body into a JSON value.
///
/// Bodies that parse as JSON become that value (regardless of the declared content type, since
/// many APIs mislabel it). Other UTF-8 bodies become a JSON string. Binary bodies become
/// `{"encoding": "base64", "mimeType": ..., "data": ...}`.
#[must_use]
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Value {
    if bytes.is_empty() {
        return if is_json_content_type(content_type) {
            Value::Null
        } else {
            Value::String(String::new())
        };
    }

    if let Ok(v) = serde_json::from_slice::<Value>(bytes) {
        return v;
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
    }
}

/// Message for a non-success upstream response.
///
/// Prefers a string `message` field in a JSON error body; otherwise describes the status and
/// includes the body text.
#[must_use]
pub fn upstream_error_message(status: reqwest::StatusCode, body: &Value) -> String {
    if let Some(msg) = body.get("message").and_then(Value::as_str)
        && !msg.is_empty()
    {
        return msg.to_string();
    }

    let reason = status.canonical_reason().unwrap_or("");
    let detail = match body {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let head = format!("API returned {} {reason}", status.as_u16());
    let head = head.trim_end();
    if detail.is_empty() {
        head.to_string()
    } else {
        format!("{head}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use mcp_api_gateway_test_support::MockUpstream;
    use reqwest::StatusCode;

    #[test]
    fn json_bodies_parse_even_when_mislabelled() {
        let v = decode_body(br#"{"id":1}"#, Some("text/plain"));
        assert_eq!(v, json!({"id": 1}));
    }

    #[test]
    fn text_and_binary_bodies() {
        assert_eq!(
            decode_body(b"plain words", Some("text/plain")),
            Value::String("plain words".to_string())
        );

        let v = decode_body(&[0xff, 0xfe, 0x00], Some("application/octet-stream"));
        assert_eq!(v["encoding"], "base64");
        assert_eq!(v["mimeType"], "application/octet-stream");
        assert_eq!(v["data"], "//4A");
    }

    #[test]
    fn empty_body_depends_on_content_type() {
        assert_eq!(decode_body(b"", Some("application/json")), Value::Null);
        assert_eq!(decode_body(b"", Some("application/problem+json")), Value::Null);
        assert_eq!(decode_body(b"", None), Value::String(String::new()));
    }

    #[test]
    fn error_message_prefers_message_field() {
        let body = json!({"message": "quota exceeded", "code": 42});
        assert_eq!(
            upstream_error_message(StatusCode::INTERNAL_SERVER_ERROR, &body),
            "quota exceeded"
        );
    }

    #[test]
    fn error_message_falls_back_to_status_and_body() {
        let msg = upstream_error_message(StatusCode::NOT_FOUND, &json!("no such order"));
        assert_eq!(msg, "API returned 404 Not Found: no such order");

        let msg = upstream_error_message(StatusCode::BAD_GATEWAY, &Value::Null);
        assert_eq!(msg, "API returned 502 Bad Gateway");
    }

    #[tokio::test]
    async fn limited_read_rejects_oversized_body() {
        let app = Router::new().route("/big", get(|| async { "x".repeat(1024) }));
        let upstream = MockUpstream::start(app).await.expect("start");

        let client = reqwest::Client::new();
        let url = format!("{}/big", upstream.base_url());

        let resp = client.get(&url).send().await.expect("send");
        let err = read_body_limited(resp, Some(100)).await.unwrap_err();
        assert!(matches!(err, HttpToolsError::TooLarge(_)));

        let resp = client.get(&url).send().await.expect("send");
        let body = read_body_limited(resp, Some(4096)).await.expect("read");
        assert_eq!(body.len(), 1024);

        upstream.stop().await;
    }
}

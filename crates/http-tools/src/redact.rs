//! Redaction of outbound URLs in error text.
//!
//! Transport errors from `reqwest` embed the full request URL, which may carry credentials in
//! the userinfo or an API key in the query string. Everything returned to tool callers goes
//! through these helpers first.

use url::Url;

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Human-readable transport error text, classified by failure kind.
#[must_use]
pub fn transport_error_message(e: &reqwest::Error) -> String {
    let detail = sanitize_reqwest_error(e);
    if e.is_timeout() {
        format!("request timed out ({detail})")
    } else if e.is_connect() {
        format!("connection failed ({detail})")
    } else {
        detail
    }
}

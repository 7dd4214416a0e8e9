//! Header layering for outbound requests.
//!
//! Static headers configured per API form the base layer; per-call headers are applied on top.
//! Header names are case-insensitive, so `x-api-key` from a call replaces `X-API-Key` from the
//! static layer.

use crate::error::{HttpToolsError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Build a `HeaderMap` from a base layer and an override layer.
///
/// # Errors
///
/// Returns [`HttpToolsError::Header`] if a name or value is not a valid HTTP header.
pub fn merge_headers<B, O, K1, V1, K2, V2>(base: B, overrides: O) -> Result<HeaderMap>
where
    B: IntoIterator<Item = (K1, V1)>,
    O: IntoIterator<Item = (K2, V2)>,
    K1: AsRef<str>,
    V1: AsRef<str>,
    K2: AsRef<str>,
    V2: AsRef<str>,
{
    let mut out = HeaderMap::new();
    for (name, value) in base {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        out.insert(name, value);
    }
    for (name, value) in overrides {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        out.insert(name, value);
    }
    Ok(out)
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| HttpToolsError::Header(format!("'{name}': {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| HttpToolsError::Header(format!("value for '{name}': {e}")))?;
    Ok((header_name, header_value))
}

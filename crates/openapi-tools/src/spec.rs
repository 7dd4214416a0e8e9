//! Specification loading.
//!
//! Documents are fetched (HTTP/HTTPS) or read from disk, parsed as YAML (JSON is a YAML subset),
//! and normalized into an [`ApiDocument`]. OpenAPI 3.x goes through `openapiv3`; Swagger 2.0 is
//! normalized straight from the JSON tree.

use crate::config::{SpecSource, is_http_location};
use crate::error::{BridgeError, Result};
use crate::operation::OperationTable;
use crate::{normalize, swagger2};
use mcp_api_gateway_http::redact::sanitize_reqwest_error;
use mcp_api_gateway_http::response::read_body_limited;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A normalized specification: metadata plus the operation table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiDocument {
    pub title: Option<String>,
    pub version: Option<String>,
    /// Declared server URLs, in declaration order (server variables replaced by defaults).
    pub servers: Vec<String>,
    pub operations: OperationTable,
}

/// Fetches and parses specifications.
#[derive(Debug, Clone)]
pub struct SpecLoader {
    client: reqwest::Client,
    timeout: Option<Duration>,
    max_bytes: Option<usize>,
}

impl SpecLoader {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Some(Self::DEFAULT_TIMEOUT),
            max_bytes: None,
        }
    }

    /// Bound the whole load (fetch + parse). `None` disables the bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: Option<usize>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Load and normalize a specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, read, or parsed, or if the load
    /// exceeds the configured timeout.
    pub async fn load(&self, source: &SpecSource) -> Result<ApiDocument> {
        let location = source.describe().to_string();
        let fut = async {
            match source {
                SpecSource::Document(value) => document_from_value(&location, value.clone()),
                SpecSource::Location(loc) => {
                    let text = self.read_text(loc).await?;
                    parse_document(loc, &text)
                }
            }
        };

        match self.timeout {
            Some(t) => tokio::time::timeout(t, fut)
                .await
                .map_err(|_| BridgeError::SpecFetch {
                    location,
                    message: format!("timed out after {t:?}"),
                })?,
            None => fut.await,
        }
    }

    async fn read_text(&self, location: &str) -> Result<String> {
        if is_http_location(location) {
            tracing::info!(spec = %location, "Fetching spec");
            let url = Url::parse(location).map_err(|e| BridgeError::SpecFetch {
                location: location.to_string(),
                message: format!("invalid URL: {e}"),
            })?;
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| BridgeError::SpecFetch {
                    location: location.to_string(),
                    message: sanitize_reqwest_error(&e),
                })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(BridgeError::SpecFetch {
                    location: location.to_string(),
                    message: format!("HTTP {status}"),
                });
            }
            let bytes = read_body_limited(resp, self.max_bytes)
                .await
                .map_err(|e| BridgeError::SpecFetch {
                    location: location.to_string(),
                    message: e.to_string(),
                })?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let path = match Url::parse(location) {
            Ok(u) if u.scheme() == "file" => {
                u.to_file_path().map_err(|()| BridgeError::SpecFetch {
                    location: location.to_string(),
                    message: "file URL has no local path".to_string(),
                })?
            }
            _ => location.into(),
        };
        tracing::info!(spec = %path.display(), "Loading spec");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| BridgeError::SpecReadFile {
                path: location.to_string(),
                source: e,
            })
    }
}

/// Parse specification text (YAML or JSON).
///
/// # Errors
///
/// Returns [`BridgeError::SpecParse`] for invalid YAML/JSON and [`BridgeError::SpecInvalid`]
/// when the document is not a recognizable OpenAPI 3.x or Swagger 2.0 document.
pub fn parse_document(location: &str, text: &str) -> Result<ApiDocument> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| BridgeError::SpecParse {
            location: location.to_string(),
            source: e,
        })?;
    // YAML allows non-string keys (e.g. `200:` under responses); serde_json stringifies them.
    let value = serde_json::to_value(yaml).map_err(|e| BridgeError::SpecInvalid {
        location: location.to_string(),
        message: e.to_string(),
    })?;
    document_from_value(location, value)
}

/// Normalize an already-parsed document.
///
/// # Errors
///
/// Returns [`BridgeError::SpecInvalid`] if the document is neither OpenAPI 3.x nor Swagger 2.0,
/// or does not have the expected structure.
pub fn document_from_value(location: &str, value: Value) -> Result<ApiDocument> {
    let invalid = |message: String| BridgeError::SpecInvalid {
        location: location.to_string(),
        message,
    };

    if let Some(version) = value.get("swagger") {
        let version = version.as_str().unwrap_or_default();
        if !version.starts_with('2') {
            return Err(invalid(format!("unsupported swagger version '{version}'")));
        }
        return swagger2::normalize(&value).map_err(invalid);
    }

    if value.get("openapi").is_none() {
        return Err(invalid(
            "missing 'openapi' or 'swagger' version field".to_string(),
        ));
    }

    let spec: openapiv3::OpenAPI =
        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
    Ok(normalize::from_openapi(&spec))
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where an API's specification comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecSource {
    /// `http(s)://` URL, `file://` URL, or a filesystem path.
    Location(String),
    /// An already-parsed document (OpenAPI 3.x or Swagger 2.0).
    Document(Value),
}

impl SpecSource {
    /// Human-readable origin, used in logs and error messages.
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            Self::Location(loc) => loc,
            Self::Document(_) => "<inline document>",
        }
    }

    /// The spec URL when the document was fetched over HTTP(S).
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Location(loc) if is_http_location(loc) => Some(loc),
            _ => None,
        }
    }
}

pub(crate) fn is_http_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// One API record as produced by configuration loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub name: String,
    pub spec: SpecSource,
    /// Takes priority over the spec's declared servers. Empty counts as unset.
    pub base_url: Option<String>,
    /// Static headers applied to every request against this API.
    pub headers: BTreeMap<String, String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: SpecSource) -> Self {
        Self {
            name: name.into(),
            spec,
            base_url: None,
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Arguments of the generic `execute_api` tool and of `POST /api/execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteArgs {
    pub api_name: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<serde_json::Map<String, Value>>,
}

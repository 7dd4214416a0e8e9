//! Normalized operation model shared by OpenAPI 3.x and Swagger 2.0 documents.

use crate::error::BridgeError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The HTTP methods that become tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Visiting order used when walking a path item.
    pub const ALL: [Self; 5] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
        }
    }

    /// Whether a JSON request body becomes the `body` tool argument.
    #[must_use]
    pub fn accepts_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            other => Err(BridgeError::InvalidArguments(format!(
                "unsupported HTTP method '{other}' (expected one of GET, POST, PUT, DELETE, PATCH)"
            ))),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
            HttpMethod::Patch => Self::PATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }

    /// Query and path parameters are tool arguments; headers and cookies come from static
    /// headers instead.
    #[must_use]
    pub fn is_tool_argument(self) -> bool {
        matches!(self, Self::Query | Self::Path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub description: Option<String>,
    /// Declared JSON-schema type; `None` derives as `string`.
    pub schema_type: Option<String>,
}

/// A JSON request body. Only the top-level properties of its schema are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodySpec {
    pub required: bool,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    pub summary: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<BodySpec>,
    /// Set when the definition could not be normalized (e.g. a dangling `$ref`).
    pub defect: Option<String>,
}

/// All operations declared under one path template, in method visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub template: String,
    pub operations: Vec<(HttpMethod, Operation)>,
}

/// Path templates in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationTable {
    pub paths: Vec<PathEntry>,
}

impl OperationTable {
    /// Iterate `(path template, method, operation)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HttpMethod, &Operation)> {
        self.paths.iter().flat_map(|entry| {
            entry
                .operations
                .iter()
                .map(move |(method, op)| (entry.template.as_str(), *method, op))
        })
    }

    #[must_use]
    pub fn get(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths
            .iter()
            .find(|e| e.template == path)?
            .operations
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, op)| op)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.iter().map(|e| e.operations.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge path-item parameters with operation parameters; the operation wins on the same
/// `(name, location)`.
pub(crate) fn merge_parameters(
    path_level: Vec<Parameter>,
    op_level: Vec<Parameter>,
) -> Vec<Parameter> {
    let mut merged = path_level;
    for p in op_level {
        if let Some(existing) = merged
            .iter_mut()
            .find(|m| m.name == p.name && m.location == p.location)
        {
            *existing = p;
        } else {
            merged.push(p);
        }
    }
    merged
}

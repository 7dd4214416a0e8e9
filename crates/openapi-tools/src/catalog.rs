//! Tool catalog compilation.
//!
//! The catalog is the two fixed tools followed by one tool per operation of every registered
//! API, ordered by registration, then path declaration, then method. Each descriptor carries its
//! resolved [`ToolKind`], so invocation never has to re-parse tool names.

use crate::error::BridgeError;
use crate::operation::HttpMethod;
use crate::registry::ApiRegistry;
use crate::schema::{self, SchemaOutcome};
use regex::Regex;
use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub const GET_API_INFO: &str = "get_api_info";
pub const EXECUTE_API: &str = "execute_api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedTool {
    GetApiInfo,
    ExecuteApi,
}

/// The operation a dynamic tool is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTarget {
    pub api_name: String,
    pub method: HttpMethod,
    pub path_template: String,
    /// The `body` argument is the JSON request body rather than a query parameter.
    pub body_is_request_body: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Fixed(FixedTool),
    Dynamic(DynamicTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub kind: ToolKind,
    pub annotations: Option<ToolAnnotations>,
}

impl ToolDescriptor {
    /// Convert to the MCP wire representation.
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let schema: JsonObject = self.input_schema.as_object().cloned().unwrap_or_default();
        let mut tool = Tool::new(self.name.clone(), self.description.clone(), Arc::new(schema));
        tool.annotations.clone_from(&self.annotations);
        tool
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn push(&mut self, tool: ToolDescriptor) {
        if self.index.contains_key(&tool.name) {
            tracing::warn!(tool = %tool.name, "Duplicate tool name; keeping the first definition");
            return;
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
    }
}

/// Compile the catalog. Deterministic for a given registry.
#[must_use]
pub fn compile(registry: &ApiRegistry) -> Catalog {
    let mut catalog = Catalog::default();
    catalog.push(get_api_info_tool());
    catalog.push(execute_api_tool());

    for api in registry.all() {
        for (path, method, operation) in api.operations.iter() {
            let name = synthesize_tool_name(&api.name, method, path);
            if path.contains('_') || api.name.contains('_') {
                tracing::debug!(
                    tool = %name,
                    "Tool name is not reversible; dispatch uses the stored path"
                );
            }

            let input_schema = match schema::derive(operation, method) {
                SchemaOutcome::Derived(s) => s,
                SchemaOutcome::Degraded { schema, reason } => {
                    let err = BridgeError::SchemaDerivation {
                        tool: name.clone(),
                        reason,
                    };
                    tracing::warn!(error = %err, "Using empty input schema");
                    schema
                }
            };

            let description = operation
                .summary
                .clone()
                .unwrap_or_else(|| format!("{} {path}", method.as_str().to_ascii_uppercase()));

            catalog.push(ToolDescriptor {
                name,
                description,
                input_schema,
                kind: ToolKind::Dynamic(DynamicTarget {
                    api_name: api.name.clone(),
                    method,
                    path_template: path.to_string(),
                    body_is_request_body: schema::exposes_request_body(operation, method),
                }),
                annotations: Some(annotations_for_method(method)),
            });
        }
    }

    catalog
}

/// `{api}_{method}_{path}` with `/`, `{`, `}` in the path replaced by `_`.
#[must_use]
pub fn synthesize_tool_name(api_name: &str, method: HttpMethod, path: &str) -> String {
    let path: String = path
        .chars()
        .map(|c| if matches!(c, '/' | '{' | '}') { '_' } else { c })
        .collect();
    format!("{api_name}_{method}_{path}")
}

static PLACEHOLDER_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_]+)_").expect("static regex"));

/// Best-effort inverse of [`synthesize_tool_name`]: `(api_name, method, path_template)`.
///
/// Lossy: API names and path segments containing `_` do not round-trip, and `/a//b` is
/// indistinguishable from `/a/{b}`.
#[must_use]
pub fn parse_tool_name(name: &str) -> Option<(String, HttpMethod, String)> {
    let mut parts = name.splitn(3, '_');
    let api_name = parts.next().filter(|s| !s.is_empty())?;
    let method: HttpMethod = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    if rest.is_empty() {
        return None;
    }
    let with_placeholders = PLACEHOLDER_SEGMENT.replace_all(rest, "/{${1}}");
    let path = with_placeholders.replace('_', "/");
    Some((api_name.to_string(), method, path))
}

fn annotations_for_method(method: HttpMethod) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method {
        HttpMethod::Get => (true, false, Some(true)),
        HttpMethod::Post => (false, false, Some(false)),
        HttpMethod::Put | HttpMethod::Delete => (false, true, Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        HttpMethod::Patch => (false, true, None),
    };
    ToolAnnotations {
        title: None,
        read_only_hint: Some(read_only),
        destructive_hint: Some(destructive),
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

fn get_api_info_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: GET_API_INFO.to_string(),
        description: "Get information about available APIs and their endpoints".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "api_name": {
                    "type": "string",
                    "description": "Name of the API to get info for (optional, returns all if not specified)"
                }
            }
        }),
        kind: ToolKind::Fixed(FixedTool::GetApiInfo),
        annotations: Some(ToolAnnotations {
            title: None,
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint: Some(false),
        }),
    }
}

fn execute_api_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: EXECUTE_API.to_string(),
        description: "Execute an API call to any registered API".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "api_name": {
                    "type": "string",
                    "description": "Name of the API to call"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"],
                    "description": "HTTP method"
                },
                "path": {
                    "type": "string",
                    "description": "API endpoint path"
                },
                "params": {
                    "type": "object",
                    "description": "Query parameters"
                },
                "data": {
                    "type": "object",
                    "description": "Request body data"
                },
                "headers": {
                    "type": "object",
                    "description": "Additional headers"
                }
            },
            "required": ["api_name", "method", "path"]
        }),
        kind: ToolKind::Fixed(FixedTool::ExecuteApi),
        annotations: None,
    }
}

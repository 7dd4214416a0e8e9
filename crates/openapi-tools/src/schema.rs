//! Input-schema derivation for operation tools.
//!
//! Query and path parameters become top-level properties in declaration order; a JSON request
//! body on POST/PUT/PATCH becomes a single `body` object property, last. `required` is always
//! present so the output shape does not depend on the operation.

use crate::operation::{HttpMethod, Operation};
use serde_json::{Map, Value, json};

/// Result of deriving one operation's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOutcome {
    Derived(Value),
    /// The operation was malformed; the schema is the empty object schema.
    Degraded { schema: Value, reason: String },
}

impl SchemaOutcome {
    #[must_use]
    pub fn schema(&self) -> &Value {
        match self {
            Self::Derived(schema) | Self::Degraded { schema, .. } => schema,
        }
    }

    #[must_use]
    pub fn into_schema(self) -> Value {
        match self {
            Self::Derived(schema) | Self::Degraded { schema, .. } => schema,
        }
    }
}

/// `{type: object, properties: {}, required: []}`
#[must_use]
pub fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

/// Whether the `body` argument carries the request body. A query or path parameter named `body`
/// takes the name instead.
#[must_use]
pub fn exposes_request_body(operation: &Operation, method: HttpMethod) -> bool {
    method.accepts_body()
        && operation.request_body.is_some()
        && !operation
            .parameters
            .iter()
            .any(|p| p.location.is_tool_argument() && p.name == "body")
}

#[must_use]
pub fn derive(operation: &Operation, method: HttpMethod) -> SchemaOutcome {
    if let Some(reason) = &operation.defect {
        return SchemaOutcome::Degraded {
            schema: empty_schema(),
            reason: reason.clone(),
        };
    }

    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for param in operation
        .parameters
        .iter()
        .filter(|p| p.location.is_tool_argument())
    {
        if properties.contains_key(&param.name) {
            continue;
        }
        let mut prop = Map::new();
        prop.insert(
            "type".to_string(),
            json!(param.schema_type.as_deref().unwrap_or("string")),
        );
        if let Some(desc) = &param.description {
            prop.insert("description".to_string(), json!(desc));
        }
        properties.insert(param.name.clone(), Value::Object(prop));
        if param.required {
            required.push(json!(param.name));
        }
    }

    if exposes_request_body(operation, method)
        && let Some(body) = &operation.request_body
    {
        properties.insert(
            "body".to_string(),
            json!({
                "type": "object",
                "description": "Request body data",
                "properties": body.properties,
            }),
        );
        if body.required {
            required.push(json!("body"));
        }
    }

    SchemaOutcome::Derived(json!({
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

//! Swagger 2.0 -> [`OperationTable`] normalization, straight from the JSON tree.
//!
//! `in: body` becomes the JSON request body; `formData` parameters are not tool arguments.
//! `host` + `basePath` become the declared server.

use crate::operation::{
    BodySpec, HttpMethod, Operation, OperationTable, ParamLocation, Parameter, PathEntry,
    merge_parameters,
};
use crate::spec::ApiDocument;
use serde_json::{Map, Value};

const MAX_REF_HOPS: usize = 8;

pub(crate) fn normalize(root: &Value) -> Result<ApiDocument, String> {
    let paths = match root.get("paths") {
        Some(Value::Object(p)) => p,
        Some(_) => return Err("'paths' must be an object".to_string()),
        None => return Err("missing 'paths'".to_string()),
    };

    let mut entries = Vec::new();
    for (template, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        let path_params = item.get("parameters");

        let mut operations = Vec::new();
        for method in HttpMethod::ALL {
            if let Some(op) = item.get(method.as_str()).and_then(Value::as_object) {
                operations.push((method, normalize_operation(root, path_params, op)));
            }
        }
        if !operations.is_empty() {
            entries.push(PathEntry {
                template: template.clone(),
                operations,
            });
        }
    }

    let info = root.get("info");
    let text = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(ApiDocument {
        title: text("title"),
        version: text("version"),
        servers: declared_server(root).into_iter().collect(),
        operations: OperationTable { paths: entries },
    })
}

fn declared_server(root: &Value) -> Option<String> {
    let base_path = root.get("basePath").and_then(Value::as_str).unwrap_or("");
    match root.get("host").and_then(Value::as_str) {
        Some(host) if !host.is_empty() => {
            let scheme = root
                .get("schemes")
                .and_then(Value::as_array)
                .and_then(|s| s.first())
                .and_then(Value::as_str)
                .unwrap_or("https");
            Some(format!("{scheme}://{host}{base_path}"))
        }
        _ if !base_path.is_empty() => Some(base_path.to_string()),
        _ => None,
    }
}

fn normalize_operation(
    root: &Value,
    path_params: Option<&Value>,
    op: &Map<String, Value>,
) -> Operation {
    let mut defect: Option<String> = None;
    let mut body: Option<BodySpec> = None;

    let mut convert = |params: Option<&Value>| -> Vec<Parameter> {
        let mut out = Vec::new();
        for raw in params.and_then(Value::as_array).into_iter().flatten() {
            let p = match resolve(root, raw) {
                Ok(p) => p,
                Err(reason) => {
                    defect.get_or_insert(reason);
                    continue;
                }
            };
            let location = match p.get("in").and_then(Value::as_str) {
                Some("query") => ParamLocation::Query,
                Some("path") => ParamLocation::Path,
                Some("header") => ParamLocation::Header,
                Some("body") => {
                    match body_spec(root, p) {
                        Ok(b) => body = Some(b),
                        Err(reason) => {
                            defect.get_or_insert(reason);
                        }
                    }
                    continue;
                }
                _ => continue,
            };
            let Some(name) = p.get("name").and_then(Value::as_str) else {
                continue;
            };
            out.push(Parameter {
                name: name.to_string(),
                location,
                required: location == ParamLocation::Path
                    || p.get("required").and_then(Value::as_bool).unwrap_or(false),
                description: p
                    .get("description")
                    .and_then(Value::as_str)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
                schema_type: p.get("type").and_then(Value::as_str).map(str::to_string),
            });
        }
        out
    };
    let path_level = convert(path_params);
    let op_level = convert(op.get("parameters"));

    Operation {
        summary: op
            .get("summary")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        parameters: merge_parameters(path_level, op_level),
        request_body: body,
        defect,
    }
}

fn body_spec(root: &Value, param: &Value) -> Result<BodySpec, String> {
    let required = param
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let Some(schema) = param.get("schema") else {
        return Ok(BodySpec {
            required,
            properties: Map::new(),
        });
    };
    let schema = resolve(root, schema)?;

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.clone(), resolve(root, v).unwrap_or(v).clone()))
                .collect()
        })
        .unwrap_or_default();

    Ok(BodySpec {
        required,
        properties,
    })
}

/// Follow local `$ref`s (`#/parameters/...`, `#/definitions/...`).
fn resolve<'a>(root: &'a Value, value: &'a Value) -> Result<&'a Value, String> {
    let mut current = value;
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return Ok(current);
        };
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| format!("unsupported $ref '{reference}'"))?;
        current = root
            .pointer(pointer)
            .ok_or_else(|| format!("unresolved $ref '{reference}'"))?;
    }
    Err("$ref chain too deep".to_string())
}

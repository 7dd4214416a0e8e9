//! OpenAPI 3.x -> [`OperationTable`] normalization.
//!
//! Local `$ref`s into `#/components/...` are followed (shallowly, with a hop limit). A dangling
//! reference does not fail the document: it marks the affected operation as defective so the
//! schema deriver can degrade just that tool.

use crate::operation::{
    BodySpec, HttpMethod, Operation, OperationTable, ParamLocation, Parameter, PathEntry,
    merge_parameters,
};
use crate::spec::ApiDocument;
use openapiv3::{
    Components, OpenAPI, ParameterSchemaOrContent, PathItem, ReferenceOr, RequestBody, Schema,
    SchemaKind, Type,
};
use serde_json::{Map, Value, json};

const MAX_REF_HOPS: usize = 8;

pub(crate) fn from_openapi(spec: &OpenAPI) -> ApiDocument {
    let refs = Refs {
        components: spec.components.as_ref(),
    };

    let mut paths = Vec::new();
    for (template, item) in &spec.paths.paths {
        let ReferenceOr::Item(item) = item else {
            tracing::warn!(path = %template, "Skipping path item defined by external $ref");
            continue;
        };
        let operations = path_operations(&refs, item);
        if !operations.is_empty() {
            paths.push(PathEntry {
                template: template.clone(),
                operations,
            });
        }
    }

    let servers = spec.servers.iter().map(server_url).collect();

    ApiDocument {
        title: Some(spec.info.title.clone()).filter(|t| !t.is_empty()),
        version: Some(spec.info.version.clone()).filter(|v| !v.is_empty()),
        servers,
        operations: OperationTable { paths },
    }
}

fn server_url(server: &openapiv3::Server) -> String {
    let mut url = server.url.clone();
    for (name, var) in server.variables.iter().flatten() {
        url = url.replace(&format!("{{{name}}}"), &var.default);
    }
    url
}

fn path_operations<'a>(refs: &Refs<'a>, item: &'a PathItem) -> Vec<(HttpMethod, Operation)> {
    let mut out = Vec::new();
    for method in HttpMethod::ALL {
        let op = match method {
            HttpMethod::Get => item.get.as_ref(),
            HttpMethod::Post => item.post.as_ref(),
            HttpMethod::Put => item.put.as_ref(),
            HttpMethod::Delete => item.delete.as_ref(),
            HttpMethod::Patch => item.patch.as_ref(),
        };
        if let Some(op) = op {
            out.push((method, normalize_operation(refs, &item.parameters, op)));
        }
    }
    out
}

fn normalize_operation<'a>(
    refs: &Refs<'a>,
    path_params: &'a [ReferenceOr<openapiv3::Parameter>],
    op: &'a openapiv3::Operation,
) -> Operation {
    let mut defect = None;

    let mut convert = |params: &'a [ReferenceOr<openapiv3::Parameter>]| -> Vec<Parameter> {
        let mut out = Vec::new();
        for p in params {
            match refs.parameter(p).and_then(|p| refs.convert_parameter(p)) {
                Ok(p) => out.push(p),
                Err(reason) => {
                    defect.get_or_insert(reason);
                }
            }
        }
        out
    };
    let path_level = convert(path_params);
    let op_level = convert(&op.parameters);
    let parameters = merge_parameters(path_level, op_level);

    let request_body = match op.request_body.as_ref().map(|b| refs.request_body_spec(b)) {
        Some(Ok(body)) => body,
        Some(Err(reason)) => {
            defect.get_or_insert(reason);
            None
        }
        None => None,
    };

    Operation {
        summary: op.summary.clone().filter(|s| !s.is_empty()),
        parameters,
        request_body,
        defect,
    }
}

struct Refs<'a> {
    components: Option<&'a Components>,
}

impl<'a> Refs<'a> {
    fn parameter(
        &self,
        item: &'a ReferenceOr<openapiv3::Parameter>,
    ) -> Result<&'a openapiv3::Parameter, String> {
        follow(item, "#/components/parameters/", |name| {
            self.components?.parameters.get(name)
        })
    }

    fn schema(&self, item: &'a ReferenceOr<Schema>) -> Result<&'a Schema, String> {
        match item {
            ReferenceOr::Item(s) => Ok(s),
            ReferenceOr::Reference { reference } => self.schema_ref(reference),
        }
    }

    fn boxed_schema(&self, item: &'a ReferenceOr<Box<Schema>>) -> Result<&'a Schema, String> {
        match item {
            ReferenceOr::Item(s) => Ok(s),
            ReferenceOr::Reference { reference } => self.schema_ref(reference),
        }
    }

    fn schema_ref(&self, reference: &'a str) -> Result<&'a Schema, String> {
        follow_ref(reference, "#/components/schemas/", |name| {
            self.components?.schemas.get(name)
        })
    }

    fn convert_parameter(&self, p: &'a openapiv3::Parameter) -> Result<Parameter, String> {
        let (data, location) = match p {
            openapiv3::Parameter::Query { parameter_data, .. } => {
                (parameter_data, ParamLocation::Query)
            }
            openapiv3::Parameter::Path { parameter_data, .. } => {
                (parameter_data, ParamLocation::Path)
            }
            openapiv3::Parameter::Header { parameter_data, .. } => {
                (parameter_data, ParamLocation::Header)
            }
            openapiv3::Parameter::Cookie { parameter_data, .. } => {
                (parameter_data, ParamLocation::Cookie)
            }
        };

        let schema_type = match &data.format {
            ParameterSchemaOrContent::Schema(s) => schema_type_name(self.schema(s)?),
            ParameterSchemaOrContent::Content(_) => None,
        };

        Ok(Parameter {
            name: data.name.clone(),
            location,
            // Path parameters are always required in OpenAPI.
            required: data.required || location == ParamLocation::Path,
            description: data.description.clone().filter(|d| !d.is_empty()),
            schema_type,
        })
    }

    fn request_body_spec(
        &self,
        item: &'a ReferenceOr<RequestBody>,
    ) -> Result<Option<BodySpec>, String> {
        let body = follow(item, "#/components/requestBodies/", |name| {
            self.components?.request_bodies.get(name)
        })?;

        let media = body.content.get("application/json").or_else(|| {
            body.content
                .iter()
                .find(|(ct, _)| ct.ends_with("+json") || ct.starts_with("application/json"))
                .map(|(_, m)| m)
        });
        let Some(schema) = media.and_then(|m| m.schema.as_ref()) else {
            return Ok(None);
        };
        let schema = self.schema(schema)?;

        Ok(Some(BodySpec {
            required: body.required,
            properties: self.top_level_properties(schema),
        }))
    }

    fn top_level_properties(&self, schema: &'a Schema) -> Map<String, Value> {
        let props = match &schema.schema_kind {
            SchemaKind::Type(Type::Object(o)) => &o.properties,
            SchemaKind::Any(a) => &a.properties,
            _ => return Map::new(),
        };
        props
            .iter()
            .map(|(name, prop)| {
                let value = match self.boxed_schema(prop) {
                    Ok(s) => schema_to_json(s),
                    Err(_) => match prop {
                        ReferenceOr::Reference { reference } => json!({ "$ref": reference }),
                        ReferenceOr::Item(_) => json!({}),
                    },
                };
                (name.clone(), value)
            })
            .collect()
    }
}

fn follow<'a, T>(
    item: &'a ReferenceOr<T>,
    prefix: &str,
    lookup: impl Fn(&str) -> Option<&'a ReferenceOr<T>>,
) -> Result<&'a T, String> {
    match item {
        ReferenceOr::Item(t) => Ok(t),
        ReferenceOr::Reference { reference } => follow_ref(reference, prefix, lookup),
    }
}

fn follow_ref<'a, T>(
    reference: &'a str,
    prefix: &str,
    lookup: impl Fn(&str) -> Option<&'a ReferenceOr<T>>,
) -> Result<&'a T, String> {
    let mut current = reference;
    for _ in 0..MAX_REF_HOPS {
        let name = current
            .strip_prefix(prefix)
            .ok_or_else(|| format!("unsupported $ref '{current}'"))?;
        match lookup(name) {
            Some(ReferenceOr::Item(t)) => return Ok(t),
            Some(ReferenceOr::Reference { reference }) => current = reference,
            None => return Err(format!("unresolved $ref '{current}'")),
        }
    }
    Err(format!("$ref chain too deep starting at '{reference}'"))
}

fn schema_type_name(schema: &Schema) -> Option<String> {
    match &schema.schema_kind {
        SchemaKind::Type(t) => Some(
            match t {
                Type::String(_) => "string",
                Type::Number(_) => "number",
                Type::Integer(_) => "integer",
                Type::Boolean(_) => "boolean",
                Type::Array(_) => "array",
                Type::Object(_) => "object",
            }
            .to_string(),
        ),
        SchemaKind::Any(a) => a.typ.clone(),
        _ => None,
    }
}

/// Convert an OpenAPI schema to a JSON Schema value. Nested `$ref`s are kept as references.
fn schema_to_json(schema: &Schema) -> Value {
    let mut result = json!({});

    if let Some(desc) = &schema.schema_data.description {
        result["description"] = json!(desc);
    }

    match &schema.schema_kind {
        SchemaKind::Type(t) => match t {
            Type::String(s) => {
                result["type"] = json!("string");
                if !s.enumeration.is_empty() {
                    let values: Vec<_> = s.enumeration.iter().flatten().collect();
                    result["enum"] = json!(values);
                }
            }
            Type::Number(_) => result["type"] = json!("number"),
            Type::Integer(_) => result["type"] = json!("integer"),
            Type::Boolean(_) => result["type"] = json!("boolean"),
            Type::Array(a) => {
                result["type"] = json!("array");
                if let Some(items) = &a.items {
                    result["items"] = match items {
                        ReferenceOr::Item(item) => schema_to_json(item),
                        ReferenceOr::Reference { reference } => json!({ "$ref": reference }),
                    };
                }
            }
            Type::Object(o) => {
                result["type"] = json!("object");
                if !o.properties.is_empty() {
                    let properties: Map<String, Value> = o
                        .properties
                        .iter()
                        .map(|(name, prop)| {
                            let v = match prop {
                                ReferenceOr::Item(s) => schema_to_json(s),
                                ReferenceOr::Reference { reference } => {
                                    json!({ "$ref": reference })
                                }
                            };
                            (name.clone(), v)
                        })
                        .collect();
                    result["properties"] = Value::Object(properties);
                }
                if !o.required.is_empty() {
                    result["required"] = json!(o.required);
                }
            }
        },
        SchemaKind::Any(a) => {
            if let Some(t) = &a.typ {
                result["type"] = json!(t);
            }
        }
        _ => {
            result["type"] = json!("object");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_document;

    const SHOP: &str = r##"
openapi: 3.0.3
info:
  title: Shop
  version: "2.1"
servers:
  - url: https://{region}.shop.example.test/api
    variables:
      region:
        default: eu
paths:
  /orders/{id}:
    parameters:
      - $ref: "#/components/parameters/OrderId"
    get:
      summary: Get order
      responses:
        200:
          description: ok
      parameters:
        - name: q
          in: query
          schema:
            type: string
        - name: X-Trace
          in: header
          schema:
            type: string
    patch:
      responses:
        204:
          description: patched
      requestBody:
        $ref: "#/components/requestBodies/OrderPatch"
    delete:
      responses:
        204:
          description: deleted
      parameters:
        - $ref: "#/components/parameters/Missing"
  /orders:
    post:
      summary: Create order
      responses:
        201:
          description: created
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/NewOrder"
    head:
      summary: ignored
      responses:
        200:
          description: ok
components:
  parameters:
    OrderId:
      name: id
      in: path
      required: true
      description: Order id
      schema:
        type: integer
  requestBodies:
    OrderPatch:
      content:
        application/merge-patch+json:
          schema:
            type: object
            properties:
              note:
                type: string
  schemas:
    NewOrder:
      type: object
      required: [sku]
      properties:
        sku:
          type: string
          description: Stock keeping unit
        quantity:
          $ref: "#/components/schemas/Quantity"
        shipping:
          $ref: "#/components/schemas/Address"
    Quantity:
      type: integer
    Address:
      type: object
      properties:
        city:
          type: string
"##;

    #[test]
    fn follows_component_refs_and_merges_path_params() {
        let doc = parse_document("shop", SHOP).expect("parse");
        assert_eq!(doc.servers, ["https://eu.shop.example.test/api"]);
        assert_eq!(doc.version.as_deref(), Some("2.1"));

        let get = doc.operations.get("/orders/{id}", HttpMethod::Get).expect("get");
        let names: Vec<_> = get.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["id", "q", "X-Trace"]);
        assert_eq!(get.parameters[0].schema_type.as_deref(), Some("integer"));
        assert_eq!(get.parameters[0].description.as_deref(), Some("Order id"));
        assert!(get.defect.is_none());
    }

    #[test]
    fn body_properties_are_shallow() {
        let doc = parse_document("shop", SHOP).expect("parse");
        let post = doc.operations.get("/orders", HttpMethod::Post).expect("post");
        let body = post.request_body.as_ref().expect("body");
        assert!(body.required);
        assert_eq!(
            body.properties.keys().collect::<Vec<_>>(),
            ["sku", "quantity", "shipping"]
        );
        assert_eq!(body.properties["quantity"], json!({"type": "integer"}));
        assert_eq!(
            body.properties["shipping"]["properties"]["city"],
            json!({"type": "string"})
        );

        let patch = doc.operations.get("/orders/{id}", HttpMethod::Patch).expect("patch");
        let body = patch.request_body.as_ref().expect("json-suffixed body");
        assert!(body.properties.contains_key("note"));
    }

    #[test]
    fn dangling_ref_marks_only_that_operation() {
        let doc = parse_document("shop", SHOP).expect("parse");
        let delete = doc
            .operations
            .get("/orders/{id}", HttpMethod::Delete)
            .expect("delete");
        assert!(delete.defect.as_deref().is_some_and(|d| d.contains("Missing")));
        assert!(
            doc.operations
                .get("/orders", HttpMethod::Post)
                .is_some_and(|o| o.defect.is_none())
        );
    }

    #[test]
    fn unsupported_methods_are_skipped() {
        let doc = parse_document("shop", SHOP).expect("parse");
        let methods: Vec<_> = doc
            .operations
            .iter()
            .map(|(p, m, _)| format!("{m} {p}"))
            .collect();
        assert_eq!(
            methods,
            [
                "get /orders/{id}",
                "delete /orders/{id}",
                "patch /orders/{id}",
                "post /orders"
            ]
        );
    }
}

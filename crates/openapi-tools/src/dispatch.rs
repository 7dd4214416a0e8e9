//! Request dispatch: turns a resolved invocation into one outbound HTTP request.

use crate::catalog::DynamicTarget;
use crate::config::ExecuteArgs;
use crate::error::{BridgeError, Result};
use crate::operation::HttpMethod;
use crate::registry::ApiRegistry;
use mcp_api_gateway_http::headers::merge_headers;
use mcp_api_gateway_http::redact::{redact_url, transport_error_message};
use mcp_api_gateway_http::response::{decode_body, read_body_limited, upstream_error_message};
use mcp_api_gateway_http::{HttpToolsError, OutboundPolicy};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// A fully resolved call against one registered API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchRequest {
    pub api_name: String,
    pub method: HttpMethod,
    /// Appended verbatim to the API's base URL.
    pub path: String,
    pub params: Map<String, Value>,
    pub data: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl DispatchRequest {
    /// Validate `execute_api` arguments.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArguments`] for unsupported methods, empty names or paths,
    /// and non-scalar header values.
    pub fn from_execute_args(args: ExecuteArgs) -> Result<Self> {
        if args.api_name.is_empty() {
            return Err(BridgeError::InvalidArguments("'api_name' must not be empty".into()));
        }
        if args.path.is_empty() {
            return Err(BridgeError::InvalidArguments("'path' must not be empty".into()));
        }
        let method = args.method.parse()?;
        let headers: BTreeMap<String, String> = args
            .headers
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(BridgeError::InvalidArguments(format!(
                            "header '{k}' must be a string, got {other}"
                        )));
                    }
                };
                Ok((k, v))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            api_name: args.api_name,
            method,
            path: args.path,
            params: args.params.unwrap_or_default(),
            data: args.data,
            headers,
        })
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("static regex"));

/// Bind a dynamic tool's arguments to its operation.
///
/// Placeholder arguments are substituted into the path and consumed; `body` becomes the request
/// body when the target exposes one; everything else becomes a query parameter.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedPathTemplate`] when placeholders have no matching argument.
pub fn resolve_dynamic_invocation(
    target: &DynamicTarget,
    mut arguments: Map<String, Value>,
) -> Result<DispatchRequest> {
    let mut missing = Vec::new();
    let path = PLACEHOLDER
        .replace_all(&target.path_template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match arguments.remove(name) {
                Some(Value::Null) | None => {
                    missing.push(name.to_string());
                    String::new()
                }
                Some(v) => value_to_string(&v),
            }
        })
        .into_owned();

    if !missing.is_empty() {
        return Err(BridgeError::MalformedPathTemplate {
            path: target.path_template.clone(),
            missing,
        });
    }

    let data = if target.body_is_request_body {
        arguments.remove("body")
    } else {
        None
    };

    Ok(DispatchRequest {
        api_name: target.api_name.clone(),
        method: target.method,
        path,
        params: arguments,
        data,
        headers: BTreeMap::new(),
    })
}

/// Issues requests against registered APIs. Holds no per-call state.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    policy: OutboundPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: reqwest::Client, policy: OutboundPolicy) -> Self {
        Self { client, policy }
    }

    /// Send the request and return the decoded upstream body.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ApiNotFound`] if the API is not registered (no request is sent)
    /// - [`BridgeError::InvalidArguments`] for invalid header names/values
    /// - [`BridgeError::Upstream`] for invalid URLs, transport failures, timeouts, oversized
    ///   bodies, and non-2xx responses
    pub async fn dispatch(
        &self,
        registry: &ApiRegistry,
        request: DispatchRequest,
    ) -> Result<Value> {
        let api = registry.lookup(&request.api_name)?;

        let mut url = Url::parse(&format!("{}{}", api.base_url, request.path)).map_err(|e| {
            BridgeError::upstream(format!(
                "invalid request URL '{}{}': {e}",
                api.base_url, request.path
            ))
        })?;
        append_query(&mut url, &request.params);

        let headers = merge_headers(&api.static_headers, &request.headers).map_err(|e| match e {
            HttpToolsError::Header(msg) => BridgeError::InvalidArguments(msg),
            other => BridgeError::upstream(other.to_string()),
        })?;

        tracing::debug!(
            api = %api.name,
            method = %request.method,
            url = %redact_url(&url),
            "Dispatching request"
        );

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers);
        builder = self.policy.apply(builder);
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::upstream(transport_error_message(&e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = read_body_limited(response, self.policy.max_response_bytes)
            .await
            .map_err(|e| BridgeError::upstream(e.to_string()))?;
        let body = decode_body(&bytes, content_type.as_deref());

        if !status.is_success() {
            tracing::debug!(
                api = %api.name,
                status = status.as_u16(),
                "Upstream returned error status"
            );
            return Err(BridgeError::Upstream {
                message: upstream_error_message(status, &body),
                status: Some(status.as_u16()),
            });
        }

        Ok(body)
    }
}

fn append_query(url: &mut Url, params: &Map<String, Value>) {
    let pairs: Vec<(&str, String)> = params
        .iter()
        .flat_map(|(k, v)| match v {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .filter(|i| !i.is_null())
                .map(|i| (k.as_str(), value_to_string(i)))
                .collect(),
            other => vec![(k.as_str(), value_to_string(other))],
        })
        .collect();
    if pairs.is_empty() {
        return;
    }
    let mut q = url.query_pairs_mut();
    for (k, v) in pairs {
        q.append_pair(k, &v);
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

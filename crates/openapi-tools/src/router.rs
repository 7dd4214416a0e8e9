//! Entry point shared by the MCP and HTTP transports.

use crate::catalog::{self, Catalog, FixedTool, ToolDescriptor, ToolKind};
use crate::config::ExecuteArgs;
use crate::dispatch::{DispatchRequest, Dispatcher, resolve_dynamic_invocation};
use crate::error::{BridgeError, Result};
use crate::info;
use crate::registry::ApiRegistry;
use serde_json::{Map, Value};

/// Text result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
}

/// Owns the registry and the catalog compiled from it.
#[derive(Debug)]
pub struct InvocationRouter {
    registry: ApiRegistry,
    catalog: Catalog,
    dispatcher: Dispatcher,
}

impl InvocationRouter {
    #[must_use]
    pub fn new(registry: ApiRegistry, dispatcher: Dispatcher) -> Self {
        let catalog = catalog::compile(&registry);
        tracing::debug!(tools = catalog.len(), "Compiled tool catalog");
        Self {
            registry,
            catalog,
            dispatcher,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    #[must_use]
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.catalog.tools()
    }

    /// Invoke a catalog tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownTool`] for names outside the catalog, plus whatever the
    /// resolved call fails with.
    pub async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput> {
        let tool = self
            .catalog
            .get(name)
            .ok_or_else(|| BridgeError::UnknownTool(name.to_string()))?;

        let text = match &tool.kind {
            ToolKind::Fixed(FixedTool::GetApiInfo) => {
                let api_name = match arguments.get("api_name") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(other) => {
                        return Err(BridgeError::InvalidArguments(format!(
                            "'api_name' must be a string, got {other}"
                        )));
                    }
                };
                self.api_info(api_name)?
            }
            ToolKind::Fixed(FixedTool::ExecuteApi) => {
                let args: ExecuteArgs = serde_json::from_value(Value::Object(arguments))
                    .map_err(|e| BridgeError::InvalidArguments(e.to_string()))?;
                render_result(&self.execute(args).await?)
            }
            ToolKind::Dynamic(target) => {
                let request = resolve_dynamic_invocation(target, arguments)?;
                render_result(&self.dispatch(request).await?)
            }
        };

        Ok(ToolOutput { text })
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::ApiNotFound`] when a named API is not registered.
    pub fn api_info(&self, api_name: Option<&str>) -> Result<String> {
        info::describe(&self.registry, api_name)
    }

    /// Run a generic `execute_api` call and return the upstream body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArguments`] for invalid arguments, plus any dispatch error.
    pub async fn execute(&self, args: ExecuteArgs) -> Result<Value> {
        let request = DispatchRequest::from_execute_args(args)?;
        self.dispatch(request).await
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::ApiNotFound`] or [`BridgeError::Upstream`].
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<Value> {
        self.dispatcher.dispatch(&self.registry, request).await
    }
}

/// Strings are returned as-is; everything else is pretty-printed JSON.
#[must_use]
pub fn render_result(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, SpecSource};
    use crate::spec::parse_document;
    use axum::extract::Path;
    use axum::http::{HeaderMap, Uri};
    use axum::routing::get;
    use axum::{Json, Router};
    use mcp_api_gateway_http::OutboundPolicy;
    use mcp_api_gateway_test_support::MockUpstream;
    use serde_json::json;

    const SHOP: &str = r"
openapi: 3.0.0
info: {title: Shop, version: '3'}
paths:
  /orders/{id}:
    get:
      summary: Get order
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
        - {name: q, in: query, schema: {type: string}}
      responses: {200: {description: ok}}
  /motd:
    get:
      responses: {200: {description: ok}}
  /search:
    get:
      parameters:
        - {name: body, in: query, schema: {type: string}}
      responses: {200: {description: ok}}
";

    async fn shop_router() -> (InvocationRouter, MockUpstream) {
        let app = Router::new()
            .route(
                "/orders/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    let key = headers
                        .get("x-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"id": id, "key": key}))
                }),
            )
            .route("/motd", get(|| async { "hello there" }))
            .route(
                "/search",
                get(|uri: Uri, body: String| async move {
                    Json(json!({"query": uri.query(), "body": body}))
                }),
            );
        let upstream = MockUpstream::start(app).await.expect("start");

        let mut registry = ApiRegistry::new();
        registry
            .register_document(
                &ApiConfig::new("shop", SpecSource::Document(Value::Null))
                    .with_base_url(upstream.base_url())
                    .with_header("X-Api-Key", "static"),
                parse_document("shop", SHOP).expect("parse"),
            )
            .expect("register");
        let router = InvocationRouter::new(
            registry,
            Dispatcher::new(reqwest::Client::new(), OutboundPolicy::default()),
        );
        (router, upstream)
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn dynamic_tool_dispatches_to_stored_template() {
        let (router, upstream) = shop_router().await;
        let out = router
            .invoke("shop_get__orders__id_", args(json!({"id": "42"})))
            .await
            .expect("invoke");
        let body: Value = serde_json::from_str(&out.text).expect("json text");
        assert_eq!(body, json!({"id": "42", "key": "static"}));
        assert!(out.text.contains('\n'), "pretty-printed");
        upstream.stop().await;
    }

    #[tokio::test]
    async fn text_bodies_are_returned_verbatim() {
        let (router, upstream) = shop_router().await;
        let out = router
            .invoke("shop_get__motd", Map::new())
            .await
            .expect("invoke");
        assert_eq!(out.text, "hello there");
        upstream.stop().await;
    }

    #[tokio::test]
    async fn query_parameter_named_body_is_sent_as_query() {
        let (router, upstream) = shop_router().await;
        let tool = router
            .list_tools()
            .iter()
            .find(|t| t.name == "shop_get__search")
            .cloned()
            .expect("search tool");
        assert_eq!(tool.input_schema["properties"]["body"], json!({"type": "string"}));

        let out = router
            .invoke("shop_get__search", args(json!({"body": "needle"})))
            .await
            .expect("invoke");
        let body: Value = serde_json::from_str(&out.text).expect("json text");
        assert_eq!(body, json!({"query": "body=needle", "body": ""}));
        upstream.stop().await;
    }

    #[tokio::test]
    async fn execute_api_overrides_static_headers() {
        let (router, upstream) = shop_router().await;
        let out = router
            .invoke(
                "execute_api",
                args(json!({
                    "api_name": "shop",
                    "method": "GET",
                    "path": "/orders/7",
                    "headers": {"x-api-key": "per-call"}
                })),
            )
            .await
            .expect("invoke");
        let body: Value = serde_json::from_str(&out.text).expect("json text");
        assert_eq!(body["key"], "per-call");
        upstream.stop().await;
    }

    #[tokio::test]
    async fn execute_api_rejects_bad_arguments() {
        let (router, _upstream) = shop_router().await;
        let err = router
            .invoke("execute_api", args(json!({"api_name": "shop", "method": "GET"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments(_)), "{err}");

        let err = router
            .invoke(
                "execute_api",
                args(json!({"api_name": "ghost", "method": "GET", "path": "/x"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ApiNotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn get_api_info_and_unknown_tools() {
        let (router, _upstream) = shop_router().await;

        let out = router.invoke("get_api_info", Map::new()).await.expect("info");
        assert!(out.text.starts_with("# API: shop\n"));
        assert!(out.text.ends_with(crate::info::API_SEPARATOR));

        let out = router
            .invoke("get_api_info", args(json!({"api_name": "shop"})))
            .await
            .expect("info");
        assert!(!out.text.contains("---"));

        let err = router.invoke("shop_post__nothing", Map::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownTool(n) if n == "shop_post__nothing"));
    }

    #[tokio::test]
    async fn catalog_lists_fixed_then_dynamic() {
        let (router, _upstream) = shop_router().await;
        let names: Vec<_> = router.list_tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "get_api_info",
                "execute_api",
                "shop_get__orders__id_",
                "shop_get__motd",
                "shop_get__search",
            ]
        );
    }
}

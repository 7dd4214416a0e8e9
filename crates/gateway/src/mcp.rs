//! MCP stdio surface.

use anyhow::Context as _;
use mcp_api_gateway_openapi::InvocationRouter;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt as _};
use std::sync::Arc;

const INSTRUCTIONS: &str = "Tools proxy registered HTTP APIs. Call get_api_info to see each API's \
endpoints, then call an operation tool directly or use execute_api for arbitrary requests.";

#[derive(Clone)]
pub struct McpBridge {
    router: Arc<InvocationRouter>,
}

impl McpBridge {
    #[must_use]
    pub fn new(router: Arc<InvocationRouter>) -> Self {
        Self { router }
    }

    /// Invoke a tool; failures become tool results flagged as errors.
    pub async fn call(&self, name: &str, arguments: JsonObject) -> CallToolResult {
        match self.router.invoke(name, arguments).await {
            Ok(output) => CallToolResult::success(vec![Content::text(output.text)]),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Tool call failed");
                CallToolResult::error(vec![Content::text(format!("Error: {e}"))])
            }
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("MCP API Gateway".to_string()),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self
            .router
            .list_tools()
            .iter()
            .map(|t| t.to_mcp_tool())
            .collect();
        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, "tools/call");
        Ok(self
            .call(&request.name, request.arguments.unwrap_or_default())
            .await)
    }
}

/// Serve MCP over stdin/stdout until the client disconnects.
///
/// # Errors
///
/// Fails when the MCP handshake fails or the service task aborts.
pub async fn serve_stdio(router: Arc<InvocationRouter>) -> anyhow::Result<()> {
    let service = McpBridge::new(router)
        .serve(rmcp::transport::stdio())
        .await
        .context("start MCP stdio server")?;
    let reason = service.waiting().await.context("MCP stdio server task")?;
    tracing::info!(?reason, "MCP stdio session ended");
    Ok(())
}

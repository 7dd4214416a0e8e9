//! MCP API gateway: serves OpenAPI/Swagger operations as MCP tools (stdio) or as a small HTTP
//! API, backed by `mcp-api-gateway-openapi`.

pub mod config;
pub mod http;
pub mod layers;
pub mod logging;
pub mod mcp;

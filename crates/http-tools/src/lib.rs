//! Outbound HTTP helpers for the MCP API gateway.
//!
//! This crate is used by `mcp-api-gateway-openapi` for spec fetching and for proxying tool
//! invocations to upstream APIs. It intentionally knows nothing about OpenAPI or MCP.

pub mod error;
pub mod headers;
pub mod policy;
pub mod redact;
pub mod response;

pub use error::{HttpToolsError, Result};
pub use policy::OutboundPolicy;

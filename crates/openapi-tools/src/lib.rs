//! OpenAPI/Swagger -> MCP tool bridge core.
//!
//! Registers APIs from their specifications, compiles a tool catalog from their operations, and
//! dispatches tool invocations as HTTP requests against the right API. Used by the
//! `mcp-api-gateway` binary for both its MCP stdio and HTTP surfaces.
//!
//! It intentionally contains **no** transport code.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod info;
mod normalize;
pub mod operation;
pub mod registry;
pub mod router;
pub mod schema;
pub mod spec;
mod swagger2;

pub use catalog::{Catalog, DynamicTarget, FixedTool, ToolDescriptor, ToolKind};
pub use config::{ApiConfig, ExecuteArgs, SpecSource};
pub use dispatch::{DispatchRequest, Dispatcher};
pub use error::{BridgeError, Result};
pub use operation::HttpMethod;
pub use registry::{ApiRegistry, RegisteredApi, RegistrationOutcome};
pub use router::{InvocationRouter, ToolOutput};
pub use spec::{ApiDocument, SpecLoader};

//! Human-readable API listings returned by `get_api_info` and `GET /api/info`.

use crate::error::Result;
use crate::registry::{ApiRegistry, RegisteredApi};
use std::fmt::Write as _;

/// Marker placed after each API block when describing every API.
pub const API_SEPARATOR: &str = "\n\n---\n\n";

/// Describe one API, or all of them (in registration order) when `api_name` is `None`.
///
/// # Errors
///
/// Returns [`crate::BridgeError::ApiNotFound`] when a named API is not registered.
pub fn describe(registry: &ApiRegistry, api_name: Option<&str>) -> Result<String> {
    match api_name.filter(|n| !n.is_empty()) {
        Some(name) => Ok(describe_api(registry.lookup(name)?)),
        None => Ok(registry
            .all()
            .map(|api| describe_api(api) + API_SEPARATOR)
            .collect()),
    }
}

#[must_use]
pub fn describe_api(api: &RegisteredApi) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# API: {}", api.name);
    let _ = writeln!(out, "Base URL: {}", api.base_url);
    let _ = writeln!(out, "Version: {}\n", api.version.as_deref().unwrap_or("N/A"));
    out.push_str("## Endpoints:\n");

    for (path, method, op) in api.operations.iter() {
        let _ = writeln!(out, "\n### {} {path}", method.as_str().to_ascii_uppercase());
        let _ = writeln!(out, "{}", op.summary.as_deref().unwrap_or("No description"));
        if !op.parameters.is_empty() {
            out.push_str("Parameters:\n");
            for p in &op.parameters {
                let _ = writeln!(
                    out,
                    "- {} ({}): {}",
                    p.name,
                    p.location.as_str(),
                    p.description.as_deref().unwrap_or("No description")
                );
            }
        }
    }
    out
}

//! Error types for `mcp-api-gateway-openapi`.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while registering APIs, compiling the tool catalog, or dispatching calls.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An API could not be registered (spec unreachable, unparsable, or a duplicate name).
    #[error("failed to register API '{api_name}': {cause}")]
    Registration { api_name: String, cause: String },

    #[error("API '{0}' not found")]
    ApiNotFound(String),

    /// An operation definition was malformed; its tool falls back to an empty input schema.
    #[error("schema derivation failed for '{tool}': {reason}")]
    SchemaDerivation { tool: String, reason: String },

    /// Network failure or non-2xx response from the proxied API.
    #[error("API call failed: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("path template '{path}' is missing values for: {}", missing.join(", "))]
    MalformedPathTemplate { path: String, missing: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed to fetch spec from '{location}': {message}")]
    SpecFetch { location: String, message: String },

    #[error("failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec from '{location}': {source}")]
    SpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid spec document from '{location}': {message}")]
    SpecInvalid { location: String, message: String },
}

impl BridgeError {
    pub(crate) fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    /// HTTP status used when this error is surfaced over the HTTP transport.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::ApiNotFound(_) | Self::UnknownTool(_) => StatusCode::NOT_FOUND,
            Self::InvalidArguments(_) | Self::MalformedPathTemplate { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

use crate::error::{HttpToolsError, Result};
use std::time::Duration;

/// Limits applied to every outbound request.
#[derive(Debug, Clone)]
pub struct OutboundPolicy {
    /// Per-request timeout. `None` disables it.
    pub timeout: Option<Duration>,
    /// Maximum response body size (bytes). `None` = unlimited.
    pub max_response_bytes: Option<usize>,
}

impl OutboundPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Policy from config-style values, where a timeout of `0` seconds means "no timeout".
    #[must_use]
    pub fn from_secs(timeout_secs: u64, max_response_bytes: Option<usize>) -> Self {
        Self {
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_response_bytes,
        }
    }

    /// Build the client shared by spec fetching and dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Transport`] if the TLS backend cannot be initialized.
    pub fn build_client(&self, user_agent: &str) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(HttpToolsError::from)
    }

    #[must_use]
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(t) => request.timeout(t),
            None => request,
        }
    }
}

impl Default for OutboundPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Self::DEFAULT_TIMEOUT),
            max_response_bytes: None,
        }
    }
}

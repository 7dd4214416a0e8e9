//! API registry: one immutable entry per configured API, in registration order.

use crate::config::ApiConfig;
use crate::error::{BridgeError, Result};
use crate::operation::OperationTable;
use crate::spec::{ApiDocument, SpecLoader};
use std::collections::{BTreeMap, HashMap};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredApi {
    pub name: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub operations: OperationTable,
    /// Override, else the first declared server, else empty.
    pub base_url: String,
    pub static_headers: BTreeMap<String, String>,
}

/// Per-API result of loading a configuration.
#[derive(Debug)]
pub enum RegistrationOutcome {
    Registered { api_name: String, operations: usize },
    Failed(BridgeError),
}

#[derive(Debug, Default)]
pub struct ApiRegistry {
    apis: Vec<RegisteredApi>,
    index: HashMap<String, usize>,
}

impl ApiRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every configured API, continuing past failures.
    ///
    /// Failed APIs are absent from the returned registry; each one has a
    /// [`RegistrationOutcome::Failed`] entry, in configuration order.
    pub async fn load(
        configs: &[ApiConfig],
        loader: &SpecLoader,
    ) -> (Self, Vec<RegistrationOutcome>) {
        let mut registry = Self::new();
        let mut outcomes = Vec::with_capacity(configs.len());

        for config in configs {
            let outcome = match registry.register(config, loader).await {
                Ok(api) => {
                    tracing::info!(
                        api = %api.name,
                        base_url = %api.base_url,
                        operations = api.operations.len(),
                        "Registered API"
                    );
                    RegistrationOutcome::Registered {
                        api_name: api.name.clone(),
                        operations: api.operations.len(),
                    }
                }
                Err(e) => {
                    tracing::error!(api = %config.name, error = %e, "Failed to register API");
                    RegistrationOutcome::Failed(e)
                }
            };
            outcomes.push(outcome);
        }

        (registry, outcomes)
    }

    /// Load the API's spec and register it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] if the spec cannot be loaded or the name is taken.
    pub async fn register(
        &mut self,
        config: &ApiConfig,
        loader: &SpecLoader,
    ) -> Result<&RegisteredApi> {
        self.ensure_name_free(&config.name)?;
        let document = loader
            .load(&config.spec)
            .await
            .map_err(|e| BridgeError::Registration {
                api_name: config.name.clone(),
                cause: e.to_string(),
            })?;
        self.register_document(config, document)
    }

    /// Register an API from an already-normalized document.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] if the name is empty or already registered.
    pub fn register_document(
        &mut self,
        config: &ApiConfig,
        document: ApiDocument,
    ) -> Result<&RegisteredApi> {
        self.ensure_name_free(&config.name)?;

        let base_url = resolve_base_url(
            config.base_url.as_deref(),
            &document.servers,
            config.spec.remote_url(),
        );
        if base_url.is_empty() {
            tracing::warn!(
                api = %config.name,
                "No base URL configured or declared; requests will fail until one is set"
            );
        }

        let api = RegisteredApi {
            name: config.name.clone(),
            title: document.title,
            version: document.version,
            operations: document.operations,
            base_url,
            static_headers: config.headers.clone(),
        };

        let idx = self.apis.len();
        self.index.insert(api.name.clone(), idx);
        self.apis.push(api);
        Ok(&self.apis[idx])
    }

    fn ensure_name_free(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(BridgeError::Registration {
                api_name: name.to_string(),
                cause: "API name must not be empty".to_string(),
            });
        }
        if self.index.contains_key(name) {
            return Err(BridgeError::Registration {
                api_name: name.to_string(),
                cause: "an API with this name is already registered".to_string(),
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::ApiNotFound`] for unregistered names.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredApi> {
        self.index
            .get(name)
            .map(|&i| &self.apis[i])
            .ok_or_else(|| BridgeError::ApiNotFound(name.to_string()))
    }

    /// All APIs in registration order.
    pub fn all(&self) -> impl Iterator<Item = &RegisteredApi> {
        self.apis.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

/// Base URL priority: non-empty override, then the first declared server, then empty.
///
/// Relative server URLs (e.g. `/api/v3`) are resolved against the spec URL when the spec was
/// fetched over HTTP(S).
fn resolve_base_url(
    override_url: Option<&str>,
    servers: &[String],
    spec_url: Option<&str>,
) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    let Some(server) = servers.first().map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    if Url::parse(server).is_ok() {
        return server.to_string();
    }
    let resolved = spec_url
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.join(server).ok());
    match resolved {
        Some(u) => u.to_string(),
        None => server.to_string(),
    }
}

//! HTTP surface: health, API info, generic execute, and configured shortcut routes.

use crate::config::{HttpOptions, Shortcut};
use crate::layers;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, get, on, post};
use axum::{Json, Router};
use mcp_api_gateway_openapi::{
    BridgeError, DynamicTarget, ExecuteArgs, HttpMethod, InvocationRouter,
    dispatch::resolve_dynamic_invocation,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<InvocationRouter>,
    pub started: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(router: Arc<InvocationRouter>) -> Self {
        Self {
            router,
            started: Instant::now(),
        }
    }
}

/// A [`BridgeError`] rendered as `{"error": message}`.
struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(value: BridgeError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the HTTP router. `/api/` routes, shortcuts under `/api/` included, are rate limited
/// when `options` asks for it; CORS applies everywhere.
///
/// # Errors
///
/// Fails when the CORS origin or rate limit settings are invalid.
pub fn app(
    state: AppState,
    shortcuts: &[Shortcut],
    options: &HttpOptions,
) -> anyhow::Result<Router> {
    let mut api = Router::new()
        .route("/api/info", get(api_info))
        .route("/api/execute", post(execute));
    let mut open = Router::new().route("/health", get(health));

    for shortcut in shortcuts {
        tracing::info!(
            route = %shortcut.route,
            method = %shortcut.method,
            api = %shortcut.api,
            path = %shortcut.path,
            "Registered shortcut"
        );
        let filter = method_filter(shortcut.method);
        let route = shortcut.route.clone();
        let shortcut = Arc::new(shortcut.clone());
        let handler = move |state: State<AppState>,
                            path: Path<HashMap<String, String>>,
                            query: Query<Vec<(String, String)>>,
                            body: Bytes| {
            let shortcut = Arc::clone(&shortcut);
            async move { run_shortcut(state, &shortcut, path, query, body).await }
        };
        if route.starts_with("/api/") {
            api = api.route(&route, on(filter, handler));
        } else {
            open = open.route(&route, on(filter, handler));
        }
    }

    if let Some(limit) = options.rate_limit {
        api = layers::rate_limited(api, limit)?;
    }

    Ok(open
        .merge(api)
        .fallback(not_found)
        .layer(layers::cors_layer(&options.cors_origin)?)
        .with_state(state))
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": now_rfc3339(),
        "uptime": state.started.elapsed().as_secs_f64(),
        "apis": state.router.registry().len(),
    }))
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    api_name: Option<String>,
}

async fn api_info(
    State(state): State<AppState>,
    Query(q): Query<InfoQuery>,
) -> Result<Json<Value>, ApiError> {
    let text = state.router.api_info(q.api_name.as_deref())?;
    Ok(Json(json!({ "content": [{ "type": "text", "text": text }] })))
}

async fn execute(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let args: ExecuteArgs = serde_json::from_slice(&body)
        .map_err(|e| BridgeError::InvalidArguments(e.to_string()))?;
    tracing::debug!(api = %args.api_name, method = %args.method, path = %args.path, "execute");
    Ok(Json(state.router.execute(args).await?))
}

async fn run_shortcut(
    State(state): State<AppState>,
    shortcut: &Shortcut,
    Path(route_params): Path<HashMap<String, String>>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let target = DynamicTarget {
        api_name: shortcut.api.clone(),
        method: shortcut.upstream_method,
        path_template: shortcut.path.clone(),
        body_is_request_body: false,
    };
    let arguments: Map<String, Value> = route_params
        .into_iter()
        .map(|(k, v)| {
            check_route_value(&k, &v)?;
            Ok((k, Value::String(v)))
        })
        .collect::<Result<_, BridgeError>>()?;
    let mut request = resolve_dynamic_invocation(&target, arguments)?;
    // Route parameters not used by the template are not forwarded.
    request.params.clear();
    request.data = None;

    if shortcut.method.accepts_body() {
        if !body.is_empty() {
            request.data = Some(
                serde_json::from_slice(&body)
                    .map_err(|e| BridgeError::InvalidArguments(format!("request body: {e}")))?,
            );
        }
    } else {
        request.params = query_params(query);
    }

    Ok(Json(state.router.dispatch(request).await?))
}

/// Route values are spliced into the upstream path and must stay a single segment.
fn check_route_value(name: &str, value: &str) -> Result<(), BridgeError> {
    if value == "." || value == ".." || value.contains(['/', '\\', '?', '#']) {
        return Err(BridgeError::InvalidArguments(format!(
            "route parameter '{name}' must be a single path segment"
        )));
    }
    Ok(())
}

/// Repeated keys become arrays, which the dispatcher sends back out as repeated keys.
fn query_params(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut params = Map::new();
    for (k, v) in pairs {
        match params.get_mut(&k) {
            Some(Value::Array(items)) => items.push(Value::String(v)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(v)]);
            }
            None => {
                params.insert(k, Value::String(v));
            }
        }
    }
    params
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "path": uri.path(),
            "timestamp": now_rfc3339(),
        })),
    )
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Fails when the server loop aborts.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

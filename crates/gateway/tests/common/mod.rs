#![allow(dead_code)]

use anyhow::Context as _;
use axum::extract::Path;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

pub use mcp_api_gateway_test_support::{KillOnDrop, MockUpstream};

pub const BIN: &str = env!("CARGO_BIN_EXE_mcp-api-gateway");

pub fn pick_unused_port() -> anyhow::Result<u16> {
    mcp_api_gateway_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    mcp_api_gateway_test_support::wait_http_ok(url, timeout_dur).await
}

pub fn spawn_http_gateway(
    config_path: &std::path::Path,
    port: u16,
    envs: &[(&str, &str)],
) -> anyhow::Result<Child> {
    Command::new(BIN)
        .arg("--config")
        .arg(config_path)
        .arg("--transport")
        .arg("http")
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .envs(envs.iter().copied())
        .stdout(Stdio::null())
        .spawn()
        .context("spawn gateway")
}

/// Relative server URL, resolved against wherever the spec is fetched from.
pub const PETS_SPEC: &str = r"
openapi: 3.0.3
info: {title: Pets, version: 1.0.0}
servers:
  - url: /v1
paths:
  /pets/{id}:
    get:
      summary: Get a pet
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
      responses:
        200: {description: ok}
";

/// Serves `PETS_SPEC` at `/openapi.yaml` and the API itself under `/v1`.
pub async fn start_pets_upstream() -> anyhow::Result<MockUpstream> {
    let app = Router::new()
        .route("/openapi.yaml", get(|| async { PETS_SPEC }))
        .route(
            "/v1/pets/{id}",
            get(|Path(id): Path<String>, headers: HeaderMap| async move {
                let key = headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "id": id, "name": "Rex", "key": key }))
            }),
        );
    MockUpstream::start(app).await
}

/// One reachable API, one unreachable API, and a shortcut to the reachable one.
pub fn write_config(upstream: &MockUpstream) -> anyhow::Result<tempfile::NamedTempFile> {
    let base = upstream.base_url();
    let cfg = format!(
        r#"
apis:
  - name: pets
    spec: "{base}/openapi.yaml"
    headers:
      X-Api-Key: "${{PETS_KEY}}"
  - name: broken
    spec: /definitely/not/here.yaml
shortcuts:
  - route: /pet/{{id}}
    api: pets
    path: /pets/{{id}}
"#
    );
    let file = tempfile::NamedTempFile::new().context("create temp config")?;
    std::fs::write(file.path(), cfg).context("write temp config")?;
    Ok(file)
}

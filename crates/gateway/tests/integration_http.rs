mod common;

use common::{
    KillOnDrop, pick_unused_port, spawn_http_gateway, start_pets_upstream, wait_http_ok,
    write_config,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test]
async fn http_surface_serves_registered_apis() -> anyhow::Result<()> {
    let upstream = start_pets_upstream().await?;
    let config = write_config(&upstream)?;

    let port = pick_unused_port()?;
    let gateway = spawn_http_gateway(config.path(), port, &[("PETS_KEY", "k-123")])?;
    let _gateway = KillOnDrop(gateway);
    let base = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base}/health"), Duration::from_secs(30)).await?;

    let client = reqwest::Client::new();

    // The unreachable API is skipped; the other one still registers.
    let health: Value = client.get(format!("{base}/health")).send().await?.json().await?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["apis"], 1);

    let info: Value = client
        .get(format!("{base}/api/info"))
        .send()
        .await?
        .json()
        .await?;
    let text = info["content"][0]["text"].as_str().unwrap_or_default();
    assert!(
        text.starts_with(&format!("# API: pets\nBase URL: {}/v1\n", upstream.base_url())),
        "{text}"
    );
    assert!(text.contains("### GET /pets/{id}\nGet a pet\n"));
    assert!(text.ends_with("\n\n---\n\n"));

    let resp = client
        .post(format!("{base}/api/execute"))
        .json(&json!({"api_name": "pets", "method": "GET", "path": "/pets/9"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"id": "9", "name": "Rex", "key": "k-123"}));

    let body: Value = client
        .get(format!("{base}/pet/4"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["id"], "4");

    let resp = client
        .post(format!("{base}/api/execute"))
        .json(&json!({"api_name": "broken", "method": "GET", "path": "/"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "API 'broken' not found");

    let resp = client.get(format!("{base}/missing")).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["path"], "/missing");

    upstream.stop().await;
    Ok(())
}

#[tokio::test]
async fn env_records_register_apis_without_a_config_file() -> anyhow::Result<()> {
    let upstream = start_pets_upstream().await?;
    let empty = tempfile::NamedTempFile::new()?;
    let spec_url = format!("{}/openapi.yaml", upstream.base_url());

    let port = pick_unused_port()?;
    let gateway = spawn_http_gateway(
        empty.path(),
        port,
        &[
            ("API_1_NAME", "envpets"),
            ("API_1_SWAGGER_URL", spec_url.as_str()),
            ("API_1_HEADER_X_API_KEY", "from-env"),
        ],
    )?;
    let _gateway = KillOnDrop(gateway);
    let base = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base}/health"), Duration::from_secs(30)).await?;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/api/execute"))
        .json(&json!({"api_name": "envpets", "method": "get", "path": "/pets/1"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["key"], "from-env");

    upstream.stop().await;
    Ok(())
}

#[tokio::test]
async fn cors_and_rate_limit_come_from_env() -> anyhow::Result<()> {
    let upstream = start_pets_upstream().await?;
    let config = write_config(&upstream)?;

    let port = pick_unused_port()?;
    let gateway = spawn_http_gateway(
        config.path(),
        port,
        &[
            ("PETS_KEY", "k-123"),
            ("CORS_ORIGIN", "https://app.test"),
            ("RATE_LIMIT_WINDOW_MS", "60000"),
            ("RATE_LIMIT_MAX_REQUESTS", "1"),
        ],
    )?;
    let _gateway = KillOnDrop(gateway);
    let base = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base}/health"), Duration::from_secs(30)).await?;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/api/info"))
        .header("Origin", "https://app.test")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.test")
    );

    let resp = client.get(format!("{base}/api/info")).send().await?;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = resp.json().await?;
    assert_eq!(
        body["error"],
        "Too many requests from this IP, please try again later."
    );

    // Health checks are outside /api/ and never limited.
    let resp = client.get(format!("{base}/health")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    upstream.stop().await;
    Ok(())
}

use anyhow::Context as _;
use clap::Parser as _;
use mcp_api_gateway::config::{Cli, GatewayConfig, Transport, load_env_file};
use mcp_api_gateway::{http, logging, mcp};
use mcp_api_gateway_openapi::{
    ApiRegistry, Dispatcher, InvocationRouter, RegistrationOutcome, SpecLoader,
};
use std::collections::HashMap;
use std::sync::Arc;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    load_env_file(cli.env_file.as_deref())?;
    logging::init(&cli.log_level, cli.log_format)?;

    let env: HashMap<String, String> = std::env::vars().collect();
    let config = GatewayConfig::load(&cli, &env)?;
    if config.apis.is_empty() {
        tracing::warn!("No APIs configured; only get_api_info and execute_api will be listed");
    }

    let client = config
        .outbound
        .build_client(USER_AGENT)
        .context("build HTTP client")?;
    let loader = SpecLoader::new(client.clone()).with_timeout(config.spec_timeout);
    let (registry, outcomes) = ApiRegistry::load(&config.apis, &loader).await;
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, RegistrationOutcome::Failed(_)))
        .count();
    tracing::info!(failed, "Loaded {} APIs", registry.len());

    let router = Arc::new(InvocationRouter::new(
        registry,
        Dispatcher::new(client, config.outbound.clone()),
    ));

    match cli.transport {
        Transport::Stdio => mcp::serve_stdio(router).await,
        Transport::Http => {
            let bind = cli.bind_addr(&env);
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("bind {bind}"))?;
            tracing::info!(addr = %bind, "HTTP server listening");
            let app = http::app(
                http::AppState::new(router),
                &config.shortcuts,
                &cli.http_options(),
            )?;
            http::serve(listener, app).await
        }
    }
}

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs always go to stderr; in stdio mode stdout carries the
/// MCP protocol.
///
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Fails when `level` is not a valid filter or a subscriber is already installed.
pub fn init(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("invalid log level '{level}': {e}"))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

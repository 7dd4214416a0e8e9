//! Gateway configuration: CLI flags, the optional YAML/JSON config file, and `API_<n>_*`
//! environment records.

use anyhow::{Context as _, bail};
use clap::{Parser, ValueEnum};
use mcp_api_gateway_http::OutboundPolicy;
use mcp_api_gateway_openapi::{ApiConfig, HttpMethod, SpecSource};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_PORT: &str = "3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 15 * 60 * 1000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// MCP over stdin/stdout (newline-delimited JSON-RPC).
    Stdio,
    /// Plain HTTP/JSON endpoints.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Expose OpenAPI/Swagger APIs as MCP tools.
#[derive(Parser, Debug)]
#[command(name = "mcp-api-gateway", version, about)]
pub struct Cli {
    /// Config file (YAML or JSON) declaring APIs and HTTP shortcuts.
    #[arg(long, env = "MCP_GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Which surface to serve.
    #[arg(long, value_enum, env = "MCP_GATEWAY_TRANSPORT", default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// HTTP bind address. Defaults to `0.0.0.0:$PORT` (port 3000 when `PORT` is unset).
    #[arg(long, env = "MCP_GATEWAY_BIND")]
    pub bind: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "MCP_GATEWAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, env = "MCP_GATEWAY_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Per-request upstream timeout in seconds (`0` disables it).
    #[arg(long, env = "MCP_GATEWAY_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Timeout for fetching each API specification at startup (`0` disables it).
    #[arg(long, env = "MCP_GATEWAY_SPEC_TIMEOUT_SECS")]
    pub spec_timeout_secs: Option<u64>,

    /// Maximum upstream response size in bytes.
    #[arg(long, env = "MCP_GATEWAY_MAX_RESPONSE_BYTES")]
    pub max_response_bytes: Option<usize>,

    /// `.env` file loaded before `API_<n>_*` records are read. `./.env` is tried when unset.
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Allowed CORS origins for the HTTP surface: `*` or a comma-separated list.
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Rate-limit window for `/api/` routes, per client IP.
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value_t = DEFAULT_RATE_LIMIT_WINDOW_MS)]
    pub rate_limit_window_ms: u64,

    /// Requests allowed per window on `/api/` routes (`0` disables rate limiting).
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = DEFAULT_RATE_LIMIT_MAX_REQUESTS)]
    pub rate_limit_max_requests: u32,
}

impl Cli {
    #[must_use]
    pub fn bind_addr(&self, env: &HashMap<String, String>) -> String {
        self.bind.clone().unwrap_or_else(|| {
            let port = env.get("PORT").map_or(DEFAULT_PORT, String::as_str);
            format!("0.0.0.0:{port}")
        })
    }

    #[must_use]
    pub fn http_options(&self) -> HttpOptions {
        let rate_limit = if self.rate_limit_max_requests == 0 || self.rate_limit_window_ms == 0 {
            None
        } else {
            Some(RateLimit {
                window: Duration::from_millis(self.rate_limit_window_ms),
                max_requests: self.rate_limit_max_requests,
            })
        };
        HttpOptions {
            cors_origin: self.cors_origin.clone(),
            rate_limit,
        }
    }
}

/// Middleware settings for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub cors_origin: String,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimit>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            cors_origin: "*".to_string(),
            rate_limit: None,
        }
    }
}

/// At most `max_requests` per `window` for each client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub max_requests: u32,
}

/// Load the `.env` file. A missing default `.env` is not an error.
///
/// # Errors
///
/// Fails when an explicitly requested file cannot be loaded.
pub fn load_env_file(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).with_context(|| format!("load env file {}", p.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub apis: Vec<FileApi>,
    #[serde(default)]
    pub shortcuts: Vec<FileShortcut>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub spec_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_response_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileApi {
    pub name: String,
    /// A location string, or the specification document inline.
    pub spec: FileSpec,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FileSpec {
    Location(String),
    Document(serde_yaml::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileShortcut {
    pub route: String,
    #[serde(default = "default_shortcut_method")]
    pub method: String,
    pub api: String,
    #[serde(default)]
    pub upstream_method: Option<String>,
    pub path: String,
}

fn default_shortcut_method() -> String {
    "GET".to_string()
}

impl FileConfig {
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid YAML/JSON for this schema.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse config file {}", path.display()))
    }

    /// # Errors
    ///
    /// Fails on invalid YAML/JSON or unknown fields.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// An HTTP route that forwards to one upstream operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    /// Axum route pattern (e.g. `/weather/{city}`).
    pub route: String,
    pub method: HttpMethod,
    pub api: String,
    pub upstream_method: HttpMethod,
    /// Upstream path template; `{name}` placeholders are filled from route parameters.
    pub path: String,
}

/// Routes owned by the HTTP surface itself.
pub const RESERVED_ROUTES: [&str; 3] = ["/health", "/api/info", "/api/execute"];

/// Everything the gateway needs after merging file, environment, and flags.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub apis: Vec<ApiConfig>,
    pub shortcuts: Vec<Shortcut>,
    pub outbound: OutboundPolicy,
    pub spec_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Merge the config file and environment records; flags override file values.
    ///
    /// # Errors
    ///
    /// Fails on unreadable config files and invalid shortcuts.
    pub fn load(cli: &Cli, env: &HashMap<String, String>) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file, env)
    }

    /// # Errors
    ///
    /// Fails on invalid shortcuts and inline specs that are not JSON-compatible.
    pub fn resolve(
        cli: &Cli,
        file: FileConfig,
        env: &HashMap<String, String>,
    ) -> anyhow::Result<Self> {
        let lookup = |name: &str| env.get(name).cloned();

        let mut apis = file
            .apis
            .into_iter()
            .map(|api| file_api(api, &lookup))
            .collect::<anyhow::Result<Vec<_>>>()?;
        apis.extend(apis_from_env(env));

        let mut shortcuts = Vec::with_capacity(file.shortcuts.len());
        for raw in file.shortcuts {
            let shortcut = resolve_shortcut(raw, &lookup)?;
            if shortcuts
                .iter()
                .any(|s: &Shortcut| s.route == shortcut.route && s.method == shortcut.method)
            {
                bail!(
                    "duplicate shortcut {} {}",
                    shortcut.method.as_str().to_ascii_uppercase(),
                    shortcut.route
                );
            }
            shortcuts.push(shortcut);
        }

        let request_timeout = cli
            .request_timeout_secs
            .or(file.request_timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_response_bytes = cli.max_response_bytes.or(file.max_response_bytes);
        let spec_timeout = cli
            .spec_timeout_secs
            .or(file.spec_timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            apis,
            shortcuts,
            outbound: OutboundPolicy::from_secs(request_timeout, max_response_bytes),
            spec_timeout: (spec_timeout > 0).then(|| Duration::from_secs(spec_timeout)),
        })
    }
}

fn file_api(api: FileApi, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<ApiConfig> {
    let spec = match api.spec {
        FileSpec::Location(loc) => SpecSource::Location(expand_env(&loc, lookup)),
        FileSpec::Document(doc) => SpecSource::Document(
            serde_json::to_value(doc)
                .with_context(|| format!("inline spec for API '{}'", api.name))?,
        ),
    };
    let mut config = ApiConfig::new(api.name, spec);
    config.base_url = api.base_url.map(|u| expand_env(&u, lookup));
    config.headers = api
        .headers
        .into_iter()
        .map(|(k, v)| (k, expand_env(&v, lookup)))
        .collect();
    Ok(config)
}

fn resolve_shortcut(
    raw: FileShortcut,
    lookup: &impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Shortcut> {
    if !raw.route.starts_with('/') {
        bail!("shortcut route '{}' must start with '/'", raw.route);
    }
    if RESERVED_ROUTES.contains(&raw.route.as_str()) {
        bail!("shortcut route '{}' collides with a built-in route", raw.route);
    }
    let method: HttpMethod = raw
        .method
        .parse()
        .with_context(|| format!("shortcut route '{}'", raw.route))?;
    let upstream_method = match raw.upstream_method {
        Some(m) => m
            .parse()
            .with_context(|| format!("shortcut route '{}'", raw.route))?,
        None => method,
    };
    Ok(Shortcut {
        route: raw.route,
        method,
        api: raw.api,
        upstream_method,
        path: expand_env(&raw.path, lookup),
    })
}

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Expand `${VAR}` references. Unknown variables expand to the empty string.
pub fn expand_env(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                tracing::warn!(var = %name, "Config references an unset environment variable");
                String::new()
            })
        })
        .into_owned()
}

/// Read `API_<n>_*` records, starting at `n = 1` and stopping at the first missing name.
pub fn apis_from_env(env: &HashMap<String, String>) -> Vec<ApiConfig> {
    let mut apis = Vec::new();
    for n in 1.. {
        let prefix = format!("API_{n}_");
        let Some(name) = env.get(&format!("{prefix}NAME")) else {
            break;
        };
        let Some(spec_url) = env
            .get(&format!("{prefix}SWAGGER_URL"))
            .filter(|u| !u.trim().is_empty())
        else {
            tracing::warn!(api = %name, index = n, "Skipping API without {prefix}SWAGGER_URL");
            continue;
        };

        let mut config = ApiConfig::new(name.clone(), SpecSource::Location(spec_url.clone()));
        config.base_url = env.get(&format!("{prefix}BASE_URL")).cloned();

        if let Some(blob) = env.get(&format!("{prefix}HEADERS")) {
            match serde_json::from_str::<serde_json::Map<String, Value>>(blob) {
                Ok(map) => {
                    for (k, v) in map {
                        let v = match v {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        config.headers.insert(k, v);
                    }
                }
                Err(e) => {
                    tracing::warn!(api = %name, error = %e, "Ignoring malformed {prefix}HEADERS");
                }
            }
        }

        let header_prefix = format!("{prefix}HEADER_");
        let mut individual: Vec<(String, String)> = env
            .iter()
            .filter_map(|(k, v)| {
                let raw = k.strip_prefix(&header_prefix)?;
                (!raw.is_empty()).then(|| (raw.replace('_', "-"), v.clone()))
            })
            .collect();
        individual.sort();
        for (header, value) in individual {
            config
                .headers
                .retain(|existing, _| !existing.eq_ignore_ascii_case(&header));
            config.headers.insert(header, value);
        }

        apis.push(config);
    }
    apis
}

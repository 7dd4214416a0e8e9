//! CORS and per-IP rate limiting for the HTTP surface.

use crate::config::RateLimit;
use anyhow::{Context as _, bail};
use axum::Json;
use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::KeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again later.";

/// Credentialed CORS. `*` reflects the caller's origin; anything else is a comma-separated list
/// of allowed origins.
///
/// # Errors
///
/// Fails when an origin is not a valid header value or `*` is mixed into a list.
pub fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::mirror_request()
    } else {
        let mut origins = Vec::new();
        for o in origin.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            if o == "*" {
                bail!("CORS origin '*' cannot be combined with other origins");
            }
            origins.push(HeaderValue::from_str(o).with_context(|| format!("CORS origin '{o}'"))?);
        }
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Keys the limiter on the peer IP. Requires the server to be run with connect info.
#[derive(Clone)]
pub struct ClientIpKeyExtractor;

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Apply `limit` to every route currently in `router`.
///
/// Requests refill one at a time over the window, with the whole allowance available as a burst.
///
/// # Errors
///
/// Fails when the limiter configuration is rejected.
pub fn rate_limited<S>(router: Router<S>, limit: RateLimit) -> anyhow::Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let max_requests = limit.max_requests.max(1);
    let period = (limit.window / max_requests).max(Duration::from_millis(1));
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .period(period)
        .burst_size(max_requests)
        .finish()
        .context("invalid rate limit configuration")?;

    tracing::info!(
        window = ?limit.window,
        max_requests,
        "Rate limiting /api/ routes"
    );

    Ok(router
        .route_layer(GovernorLayer::new(Arc::new(config)))
        .route_layer(axum::middleware::map_response(too_many_requests_body)))
}

async fn too_many_requests_body(uri: Uri, response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    tracing::warn!(path = %uri.path(), "Rate limit exceeded");
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    (parts, Json(json!({ "error": TOO_MANY_REQUESTS }))).into_response()
}

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::cors::{Any, CorsLayer};

use crate::ServerError;

/// Host allowlist compiled from the server configuration. An empty set means
/// the wildcard was configured and every host is allowed.
#[derive(Debug, Clone)]
pub struct HostAllowlist {
    allowed: Arc<HashSet<String>>,
    display: Arc<String>,
    use_x_forwarded_host: bool,
}

/// Validate the configured allowed hosts. A single `*` allows everything;
/// otherwise entries must be bare hostnames or IPs. Schemes, ports, embedded
/// wildcards, whitespace, and commas are configuration errors.
pub fn parse_allowed_hosts(
    hosts: &[String],
    use_x_forwarded_host: bool,
) -> Result<HostAllowlist, ServerError> {
    let mut allowed = HashSet::new();
    let mut wildcard = false;
    for host in hosts {
        if host == "*" {
            wildcard = true;
            continue;
        }
        if host.contains('*') {
            return Err(ServerError::Configuration(format!(
                "wildcard characters are not supported: {host:?}"
            )));
        }
        if host.contains("http://") || host.contains("https://") {
            return Err(ServerError::Configuration(format!(
                "host must not contain http:// or https://: {host:?}"
            )));
        }
        if host.chars().any(char::is_whitespace) || host.contains(',') {
            return Err(ServerError::Configuration(format!(
                "host must be a single hostname: {host:?}"
            )));
        }
        if has_port(host) {
            return Err(ServerError::Configuration(format!(
                "host must not contain a port: {host:?}"
            )));
        }
        allowed.insert(hostname(host).to_ascii_lowercase());
    }
    if wildcard {
        allowed.clear();
    }

    let mut names: Vec<&String> = allowed.iter().collect();
    names.sort();
    let display = if allowed.is_empty() {
        "*".to_owned()
    } else {
        names
            .into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    Ok(HostAllowlist {
        allowed: Arc::new(allowed),
        display: Arc::new(display),
        use_x_forwarded_host,
    })
}

impl HostAllowlist {
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Decide whether a request with the given headers may proceed. The
    /// comparison uses the hostname only: ports are ignored and matching is
    /// case-insensitive.
    pub fn permits(&self, headers: &HeaderMap, host_header: Option<&str>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let raw_host = if self.use_x_forwarded_host {
            headers
                .get("x-forwarded-host")
                .and_then(|value| value.to_str().ok())
                .map(|value| value.split(',').next().unwrap_or(value).trim())
                .or(host_header)
        } else {
            host_header
        };
        let Some(raw_host) = raw_host else {
            return false;
        };
        if raw_host.is_empty() {
            return false;
        }
        self.allowed
            .contains(&hostname(raw_host).to_ascii_lowercase())
    }
}

/// Whether a configured host entry carries a port. A lone colon separates a
/// port; multiple colons without brackets are a bare IPv6 literal.
fn has_port(host: &str) -> bool {
    if let Some(rest) = host.strip_prefix('[') {
        return rest
            .find(']')
            .is_some_and(|end| rest[end + 1..].starts_with(':'));
    }
    match host.rfind(':') {
        Some(idx) => !host[..idx].contains(':'),
        None => false,
    }
}

/// Strip a port (and IPv6 brackets) from a host value.
fn hostname(raw: &str) -> &str {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match raw.rfind(':') {
        // more than one colon without brackets: a bare IPv6 literal
        Some(idx) if raw[..idx].contains(':') => raw,
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Reject requests whose `Host` header (or `X-Forwarded-Host`, when enabled)
/// is not on the allowlist.
pub async fn host_authorization(
    State(allowlist): State<HostAllowlist>,
    request: Request,
    next: Next,
) -> Response {
    let host_header = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    if allowlist.permits(request.headers(), host_header) {
        return next.run(request).await;
    }
    (
        StatusCode::BAD_REQUEST,
        format!(
            "Invalid host header. Allowed hosts: {}",
            allowlist.display()
        ),
    )
        .into_response()
}

/// Build the CORS layer from the configured origins. Origins must carry an
/// http or https scheme; a single `*` allows any origin (without
/// credentials, which the wildcard cannot carry).
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ServerError> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        ACCEPT,
        AUTHORIZATION,
        CONTENT_TYPE,
        header::HeaderName::from_static("x-csrf-token"),
    ];

    if allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(std::time::Duration::from_secs(300)));
    }

    let mut origins = Vec::with_capacity(allowed_origins.len());
    for origin in allowed_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ServerError::Configuration(format!(
                "origin must contain http:// or https://: {origin:?}"
            )));
        }
        if origin.contains('*') {
            return Err(ServerError::Configuration(format!(
                "wildcard origin patterns are not supported: {origin:?}"
            )));
        }
        // normalize to scheme://host
        let normalized = origin.trim_end_matches('/');
        origins.push(
            HeaderValue::from_str(normalized).map_err(|_| {
                ServerError::Configuration(format!("invalid origin: {origin:?}"))
            })?,
        );
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(300)))
}

/// Response headers that defeat reverse-proxy buffering on SSE endpoints.
pub fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache,no-store,must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        header::HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers.insert(
        header::HeaderName::from_static("x-proxy-buffering"),
        HeaderValue::from_static("no"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

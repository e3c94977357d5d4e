//! Gateway configuration, read once at startup from an injected
//! environment lookup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use http::Uri;

use crate::errors::ConfigError;
use crate::middleware::CorsPolicy;

pub const BACKEND_URL: &str = "BACKEND_URL";
pub const BACKEND_URL_ALIAS: &str = "NEXT_PUBLIC_API_URL";
pub const FRONTEND_URL: &str = "NEXT_PUBLIC_FRONTEND_URL";
pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const PROXY_TIMEOUT_SECS: &str = "PROXY_TIMEOUT_SECS";
pub const STATIC_DIR: &str = "STATIC_DIR";
pub const MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";

pub const DEV_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10_485_760; // 10MB

/// Read-only view of the environment.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;

    /// Like `var`, but blank values count as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// The real process environment.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Env for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Env for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Whether a missing backend origin is an error or falls back to a
/// local development server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPolicy {
    Required,
    Fallback(&'static str),
}

impl BackendPolicy {
    pub fn from_env(env: &impl Env) -> Self {
        match env.non_empty(ENVIRONMENT) {
            Some(e) if e.eq_ignore_ascii_case("development") => Self::Fallback(DEV_BACKEND_URL),
            _ => Self::Required,
        }
    }
}

/// Scheme and authority of the backend, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOrigin(String);

impl BackendOrigin {
    pub fn parse(var: &'static str, value: &str) -> Result<Self, ConfigError> {
        validate_origin(var, value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BackendOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `value` is a bare `http`/`https` origin and returns it
/// with any trailing slash removed.
pub(crate) fn validate_origin(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidOrigin {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.contains('#') {
        return Err(invalid("fragments are not allowed"));
    }
    let uri: Uri = trimmed.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        None => return Err(invalid("missing scheme (expected http:// or https://)")),
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }
    if !matches!(uri.path(), "" | "/") {
        return Err(invalid("origin must not contain a path"));
    }
    if uri.query().is_some() {
        return Err(invalid("origin must not contain a query"));
    }

    Ok(trimmed.to_string())
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub backend: BackendOrigin,
    pub cors: CorsPolicy,
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,
    pub max_body_bytes: u64,
    pub static_dir: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn from_env(env: &impl Env) -> Result<Self, ConfigError> {
        let backend = Self::backend_from_env(env, BackendPolicy::from_env(env))?;

        let frontend = env
            .non_empty(FRONTEND_URL)
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let cors = CorsPolicy::for_origin(&validate_origin(FRONTEND_URL, &frontend)?)?;

        let listen = env
            .non_empty(LISTEN_ADDR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
            var: LISTEN_ADDR,
            value: listen.clone(),
            reason: e.to_string(),
        })?;

        let request_timeout = Duration::from_secs(positive(env, PROXY_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?);
        let max_body_bytes = positive(env, MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES)?;

        Ok(Self {
            backend,
            cors,
            listen_addr,
            request_timeout,
            max_body_bytes,
            static_dir: env.non_empty(STATIC_DIR).map(PathBuf::from),
        })
    }

    fn backend_from_env(env: &impl Env, policy: BackendPolicy) -> Result<BackendOrigin, ConfigError> {
        for var in [BACKEND_URL, BACKEND_URL_ALIAS] {
            if let Some(value) = env.non_empty(var) {
                return BackendOrigin::parse(var, &value);
            }
        }
        match policy {
            BackendPolicy::Required => Err(ConfigError::MissingBackend),
            BackendPolicy::Fallback(url) => {
                tracing::warn!(backend = url, "{BACKEND_URL} not set, using development backend");
                BackendOrigin::parse(BACKEND_URL, url)
            }
        }
    }
}

fn positive(env: &impl Env, var: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = env.non_empty(var) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: "expected a positive integer".to_string(),
        }),
    }
}

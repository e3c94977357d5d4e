use hyper::StatusCode;
use thiserror::Error;

/// Startup misconfiguration. Any of these aborts the process before a
/// listener is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend origin is not configured: set BACKEND_URL (or NEXT_PUBLIC_API_URL)")]
    MissingBackend,
    #[error("invalid origin {value:?} in {var}: {reason}")]
    InvalidOrigin {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid destination {destination:?} for {pattern:?}: {reason}")]
    InvalidDestination {
        pattern: String,
        destination: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),
    #[error("HTTP Error: {0}")]
    Http(String),
    #[error("Upstream unavailable: {0}")]
    Upstream(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid request body: {0}")]
    Body(String),
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(u64),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUri(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Http(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Upstream(e.to_string())
        } else if e.is_builder() {
            Self::InvalidUri(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to bind listener: {0}")]
    Bind(#[from] warp::Error),
}

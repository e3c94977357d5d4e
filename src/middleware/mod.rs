use hyper::{HeaderMap, header::{self, HeaderName, HeaderValue}};

use crate::errors::ConfigError;


pub const ALLOW_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";
pub const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, \
Content-Length, Content-MD5, Content-Type, Date, X-Api-Version, Authorization";

/// CORS headers attached to API responses.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_credentials: bool,
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    pub fn for_origin(origin: &str) -> Result<Self, ConfigError> {
        let allow_origin = HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidOrigin {
            var: crate::config::FRONTEND_URL,
            value: origin.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            allow_credentials: true,
            allow_origin,
            allow_methods: HeaderValue::from_static(ALLOW_METHODS),
            allow_headers: HeaderValue::from_static(ALLOW_HEADERS),
        })
    }

    pub fn allow_origin(&self) -> &str {
        self.allow_origin.to_str().unwrap_or_default()
    }

    /// Replaces whatever CORS headers are present with this policy's.
    pub fn apply(&self, headers: &mut HeaderMap) {
        let stale: Vec<HeaderName> = headers
            .keys()
            .filter(|name| name.as_str().starts_with("access-control-"))
            .cloned()
            .collect();
        for name in stale {
            headers.remove(name);
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static(if self.allow_credentials { "true" } else { "false" }),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
    }
}

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{GatewayConfig, STATIC_DIR};
use crate::errors::{ConfigError, StartupError};
use crate::routing::RouteTable;
use crate::services::Upstream;

/// A request path that matched a rewrite rule.
#[derive(Debug, Clone)]
pub struct Matched {
    pub path: String,
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Shared, read-only state built once at startup.
pub struct AppState {
    pub table: RouteTable,
    pub upstream: Upstream,
    pub max_body_bytes: u64,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Result<Self, StartupError> {
        if let Some(dir) = config.static_dir.as_ref().filter(|dir| !dir.is_dir()) {
            return Err(ConfigError::InvalidValue {
                var: STATIC_DIR,
                value: dir.display().to_string(),
                reason: "not a directory".to_string(),
            }
            .into());
        }

        Ok(Self {
            table: RouteTable::for_backend(&config.backend, config.cors.clone())?,
            upstream: Upstream::new(config.request_timeout)?,
            max_body_bytes: config.max_body_bytes,
            static_dir: config.static_dir.clone(),
        })
    }
}

pub mod config;
pub mod errors;
pub mod filters;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routing;
pub mod services;

pub use config::{Env, GatewayConfig, ProcessEnv};
pub use errors::{ConfigError, GatewayError, StartupError};
pub use models::AppState;
pub use routing::{RouteRule, RouteTable};

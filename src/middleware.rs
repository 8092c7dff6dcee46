//! Cross-origin policy for the HTTP server

use actix_cors::Cors;
use log::{debug, warn};

use crate::config::ServerConfig;

/// Build CORS middleware from the server configuration. A `*` entry allows
/// any origin and an empty list refuses every cross-origin request. Methods
/// and headers are unrestricted.
pub fn build_cors(config: &ServerConfig) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials();

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        warn!("CORS: allowing any origin");
        return cors.allow_any_origin();
    }

    if config.allowed_origins.is_empty() {
        warn!("CORS: no allowed origins configured, cross-origin requests will be refused");
    }
    for origin in &config.allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    debug!("CORS: allowed origins {:?}", config.allowed_origins);
    cors
}

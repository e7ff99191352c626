use std::net::SocketAddr;

use serde::Deserialize;

use crate::{cors::CorsConfig, health::HealthConfig};

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind (defaults to `0.0.0.0:3000`)
    pub listen_address: Option<SocketAddr>,
    /// Health check endpoint
    #[serde(default)]
    pub health: HealthConfig,
    /// Cross-origin policy for browser clients served from another origin
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

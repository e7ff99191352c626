#![allow(clippy::must_use_candidate)]

//! Configuration for the Umbra relay
//!
//! Loaded from a TOML file whose values may reference environment
//! variables with `{{ env.VAR }}` placeholders.

pub mod cors;
mod env;
pub mod health;
mod loader;
pub mod relay;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use cors::CorsConfig;
pub use health::HealthConfig;
pub use relay::{DEFAULT_SYSTEM_PROMPT, ProviderConfig, RelayConfig};
pub use server::ServerConfig;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Umbra configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Relay endpoint and upstream provider configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Parse a human duration such as `"90s"` or `"2m"`
///
/// # Errors
///
/// Returns an error if the string is not a valid duration
pub fn parse_duration(value: &str) -> anyhow::Result<std::time::Duration> {
    duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid duration '{value}': {e}"))
}

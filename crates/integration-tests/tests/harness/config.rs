//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use secrecy::SecretString;
use umbra_config::{Config, HealthConfig, ProviderConfig, RelayConfig, ServerConfig, TelemetryConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config with no provider configured
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                    cors: None,
                },
                relay: RelayConfig::default(),
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Point the relay at an OpenAI-compatible backend
    pub fn with_provider(mut self, base_url: &str) -> Self {
        self.config.relay.provider = ProviderConfig {
            base_url: Some(base_url.to_owned()),
            api_key: Some(SecretString::from("test-key".to_owned())),
            model: Some("mock-model".to_owned()),
            display_name: Some("Mock Provider".to_owned()),
            timeout: Some("10s".to_owned()),
        };
        self
    }

    /// Drop the configured default model
    pub fn without_model(mut self) -> Self {
        self.config.relay.provider.model = None;
        self
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.config.relay.system_prompt = Some(prompt.to_owned());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

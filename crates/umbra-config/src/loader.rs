use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// A missing provider base URL, key, or model is not an error here: the
    /// relay reports those per request so the rest of the server stays up.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured value is malformed or out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_relay()?;
        self.validate_server()?;
        Ok(())
    }

    fn validate_relay(&self) -> anyhow::Result<()> {
        let relay = &self.relay;

        if !(0.0..=2.0).contains(&relay.temperature) {
            anyhow::bail!("relay.temperature must be between 0.0 and 2.0, got {}", relay.temperature);
        }

        if relay.max_tokens == 0 {
            anyhow::bail!("relay.max_tokens must be greater than 0");
        }

        if relay.max_body_bytes == 0 {
            anyhow::bail!("relay.max_body_bytes must be greater than 0");
        }

        for (name, path) in [
            ("relay.chat_path", &relay.chat_path),
            ("relay.provider_info_path", &relay.provider_info_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{name} must start with '/', got '{path}'");
            }
        }

        if relay.chat_path == relay.provider_info_path {
            anyhow::bail!("relay.chat_path and relay.provider_info_path must differ");
        }

        if let Some(ref raw) = relay.provider.base_url {
            let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid relay.provider.base_url: {e}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("relay.provider.base_url must use http or https");
            }
        }

        if let Some(ref timeout) = relay.provider.timeout {
            crate::parse_duration(timeout)?;
        }

        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        if let Some(ref cors) = self.server.cors
            && cors.credentials
            && cors.allows_any_origin()
        {
            anyhow::bail!("server.cors.credentials cannot be combined with a wildcard origin");
        }

        Ok(())
    }
}

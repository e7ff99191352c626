use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// System prompt injected when a request carries none
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Umbra, a secure AI assistant maintained by Concrete Security. \
Operate with a calm, professional tone that reflects the platform's confidential computing guarantees. \
Focus exclusively on the content of documents and messages supplied by the user during this session.

Core obligations:
- Work strictly from user-provided material. If none is supplied or a question cannot be answered from it, say so and invite the user to share the relevant text.
- Keep every response concise and well-structured (sections, bullet points, short paragraphs). Use tables only for comparisons or when the user explicitly requests them; otherwise prefer prose or bullet points.
- Highlight security posture when relevant: you run inside a Trusted Execution Environment (TEE) with end-to-end cryptographic protection that prevents data leakage or tampering.
- Apply advanced reasoning only to improve accuracy (e.g., chain-of-thought, extraction, summarisation). Do not expose intermediate private reasoning unless the user explicitly asks.
- Refrain from speculating about events or facts outside the provided material. If clarification is needed, ask for it instead of guessing.";

/// Relay endpoint configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Path of the chat relay endpoint
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// Path of the provider metadata endpoint
    #[serde(default = "default_provider_info_path")]
    pub provider_info_path: String,
    /// System prompt injected when the caller supplies none
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature used when the request has none
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Token budget used when the request has none
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Largest chat request body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Upstream provider
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chat_path: default_chat_path(),
            provider_info_path: default_provider_info_path(),
            system_prompt: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_body_bytes: default_max_body_bytes(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Effective system prompt, ignoring blank overrides
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

/// OpenAI-compatible upstream provider
///
/// Every field is optional at load time; the relay reports a missing base
/// URL or key per request instead of refusing to start.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the chat completions API (e.g. `https://host/v1`)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub base_url: Option<String>,
    /// Bearer credential
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model used when the request names none
    #[serde(default, deserialize_with = "blank_as_none")]
    pub model: Option<String>,
    /// Name shown to users
    #[serde(default, deserialize_with = "blank_as_none")]
    pub display_name: Option<String>,
    /// Upstream request timeout (e.g. "120s"); transport default when unset
    #[serde(default, deserialize_with = "blank_as_none")]
    pub timeout: Option<String>,
}

impl ProviderConfig {
    /// Parsed base URL, if one is configured and valid
    pub fn parsed_base_url(&self) -> Option<Url> {
        self.base_url.as_deref().and_then(|raw| Url::parse(raw).ok())
    }
}

/// Treat empty strings produced by `default("")` placeholders as unset
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()))
}

fn default_chat_path() -> String {
    "/api/confidential-chat".to_owned()
}

fn default_provider_info_path() -> String {
    "/api/provider-info".to_owned()
}

const fn default_temperature() -> f64 {
    0.2
}

const fn default_max_tokens() -> u32 {
    512
}

/// Room for a long transcript with inlined text attachments
const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

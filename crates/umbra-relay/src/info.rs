//! Credential-free provider description

use umbra_config::ProviderConfig;
use umbra_core::ProviderInfo;
use url::Url;

/// Describe the configured provider without leaking credentials
pub fn provider_info(config: &ProviderConfig) -> ProviderInfo {
    let base_url = config.base_url.as_deref().map(sanitize_base_url);
    let host = base_url.as_deref().and_then(host_of);

    ProviderInfo {
        base_url,
        host,
        display_name: config.display_name.clone().or_else(|| config.model.clone()),
        model: config.model.clone(),
    }
}

/// Strip userinfo, query and fragment; unparseable input is returned as-is
fn sanitize_base_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };

    // Both setters only fail for cannot-be-a-base URLs, which carry no userinfo
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);

    url.into()
}

/// Host with a non-default port, e.g. `vllm.internal:8000`
fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;

    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

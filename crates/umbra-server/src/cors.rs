use http::Method;
use http::header::{self, HeaderValue};
use tower_http::cors::{AllowOrigin, CorsLayer};
use umbra_config::CorsConfig;

/// Build a Tower CORS layer for browser clients of the relay
///
/// Only the methods and headers the relay endpoints use are allowed.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    layer = if config.allows_any_origin() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = config.origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    };

    if config.credentials {
        layer = layer.allow_credentials(true);
    }

    if let Some(duration) = config.max_age_duration() {
        layer = layer.max_age(duration);
    }

    layer
}

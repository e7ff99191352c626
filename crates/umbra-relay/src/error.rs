use http::StatusCode;
use thiserror::Error;
use umbra_core::HttpError;

/// Errors raised while relaying a chat turn
#[derive(Debug, Error)]
pub enum RelayError {
    /// Request messages are missing, malformed, or empty
    #[error("{0}")]
    InvalidMessages(String),

    /// Upstream base URL or credential is not configured
    #[error("{0} is not configured")]
    ProviderUnconfigured(&'static str),

    /// Request body exceeds `relay.max_body_bytes`
    #[error("request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    /// Neither the request nor the configuration names a model
    #[error("no model specified; set relay.provider.model or provide model in request")]
    ModelMissing,

    /// Network or HTTP failure talking to the provider
    #[error("upstream error: {0}")]
    UpstreamTransport(String),

    /// Failure after the upstream stream was opened
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether the request was rejected before any upstream call
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessages(_) | Self::PayloadTooLarge(_) | Self::ProviderUnconfigured(_) | Self::ModelMissing
        )
    }
}

impl HttpError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidMessages(_) | Self::ModelMissing => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ProviderUnconfigured(_) | Self::Streaming(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidMessages(_) | Self::PayloadTooLarge(_) | Self::ModelMissing => "invalid_request_error",
            Self::ProviderUnconfigured(_) => "configuration_error",
            Self::UpstreamTransport(_) => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

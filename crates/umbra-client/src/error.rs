/// Client-specific result type
pub type Result<T> = std::result::Result<T, RelayClientError>;

/// Errors from the relay client and conversation
#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// Relay answered with a non-success status
    #[error("relay returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the `error` field, or the raw body
        message: String,
    },

    /// A line of the event stream could not be decoded
    #[error("unable to parse chat stream chunk: {0}")]
    StreamParse(String),

    /// Relay reported a failure through an `error` event
    #[error("{0}")]
    Stream(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Settings could not be loaded or saved
    #[error("settings error: {0}")]
    Settings(String),
}

impl From<reqwest::Error> for RelayClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error)
        }
    }
}

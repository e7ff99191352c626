//! Relay stand-in that answers every chat request with a fixed NDJSON body
//!
//! Lets client tests feed lines a well-behaved relay would never emit.

use std::net::SocketAddr;

use axum::http::header;
use axum::response::IntoResponse;
use axum::{Router, routing};
use tokio_util::sync::CancellationToken;
use umbra_client::{DEFAULT_CHAT_PATH, RelayClient};

/// A running stub relay
pub struct StubRelay {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl StubRelay {
    /// Serve `body` verbatim as `application/x-ndjson` on the chat path
    pub async fn start(body: &'static str) -> anyhow::Result<Self> {
        let app = Router::new().route(
            DEFAULT_CHAT_PATH,
            routing::post(move || async move { ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response() }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown })
    }

    /// Relay client bound to this stub
    pub fn relay_client(&self) -> RelayClient {
        RelayClient::new(&format!("http://{}/", self.addr)).expect("valid stub URL")
    }
}

impl Drop for StubRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

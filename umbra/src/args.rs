use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Umbra chat relay
#[derive(Debug, Parser)]
#[command(name = "umbra", about = "Streaming chat relay for OpenAI-compatible providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "umbra.toml", env = "UMBRA_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "UMBRA_LISTEN")]
    pub listen: Option<SocketAddr>,
}

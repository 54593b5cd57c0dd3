use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hirelink_relay::{serve_http, serve_websocket, ServerState};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "hirelink-relay",
    version,
    about = "Development relay for HireLink conversation sync"
)]
struct Cli {
    /// Address of the realtime WebSocket listener.
    #[arg(long, env = "HIRELINK_RELAY_WS_ADDR", default_value = "0.0.0.0:9001")]
    ws_addr: String,

    /// Address of the inbox/thread HTTP listener.
    #[arg(long, env = "HIRELINK_RELAY_HTTP_ADDR", default_value = "0.0.0.0:9002")]
    http_addr: String,

    /// Shared token clients must present; unset disables the check.
    #[arg(long, env = "HIRELINK_ACCESS_TOKEN")]
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
struct RelayConfig {
    ws_addr: SocketAddr,
    http_addr: SocketAddr,
    access_token: Option<String>,
}

impl TryFrom<Cli> for RelayConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let ws_addr = cli
            .ws_addr
            .parse()
            .with_context(|| format!("invalid websocket address: {}", cli.ws_addr))?;
        let http_addr = cli
            .http_addr
            .parse()
            .with_context(|| format!("invalid http address: {}", cli.http_addr))?;
        Ok(RelayConfig {
            ws_addr,
            http_addr,
            access_token: cli.access_token,
        })
    }
}

fn init_tracing() {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter_layer).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = RelayConfig::try_from(Cli::parse())?;
    let state = Arc::new(ServerState::new(config.access_token.clone()));

    let ws_listener = TcpListener::bind(config.ws_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.ws_addr))?;
    let http_listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    info!(
        ws_addr = %config.ws_addr,
        http_addr = %config.http_addr,
        token_required = config.access_token.is_some(),
        "HireLink relay listening"
    );

    tokio::select! {
        _ = serve_websocket(ws_listener, state.clone()) => {}
        res = serve_http(http_listener, state) => {
            if let Err(e) = res {
                error!("HTTP server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

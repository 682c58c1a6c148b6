use anyhow::Context;
use clap::Parser;
use echoload::echo::{spawn_datagram_echo, spawn_websocket_echo};
use std::net::SocketAddr;
use tracing_subscriber::filter::EnvFilter;

/// Echo target for echoload runs
#[derive(Parser, Debug)]
#[clap(name = "echoload-echo")]
#[clap(version)]
struct Args {
    /// WebSocket echo listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "ECHOLOAD_ECHO_WS_ADDR")]
    ws_addr: SocketAddr,

    /// QUIC datagram echo listen address.
    #[arg(long, default_value = "0.0.0.0:4433", env = "ECHOLOAD_ECHO_DATAGRAM_ADDR")]
    datagram_addr: SocketAddr,

    /// Only serve the WebSocket echo.
    #[arg(long)]
    no_datagram: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let websocket = spawn_websocket_echo(args.ws_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket echo on {}", args.ws_addr))?;

    let datagram = if args.no_datagram {
        None
    } else {
        let server = spawn_datagram_echo(args.datagram_addr)
            .with_context(|| format!("failed to bind datagram echo on {}", args.datagram_addr))?;
        Some(server)
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");

    websocket.abort();
    if let Some(datagram) = &datagram {
        datagram.abort();
    }
    websocket.wait().await;
    if let Some(datagram) = datagram {
        datagram.wait().await;
    }
    Ok(())
}

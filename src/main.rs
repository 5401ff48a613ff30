//! Line Chat Server - Entry Point
//!
//! Binds the TCP listener, starts the chat core and feeds it accepted
//! connections until a shutdown signal arrives.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use line_chat::{ChatConfig, Director};

/// How long shutdown waits for the actor loops
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Line-oriented TCP chat room
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (1-65535)
    #[arg(long, default_value_t = 9999, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Seconds a new connection may take to send its name (no limit when omitted)
    #[arg(long, value_name = "SECS")]
    handshake_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=info")),
        )
        .init();

    let args = Args::parse();
    let config = ChatConfig::default()
        .with_handshake_timeout(args.handshake_timeout.map(Duration::from_secs));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat server listening on {}", addr);

    let director = Director::start(config);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if director.intake(stream, peer.to_string()).await.is_err() {
                        warn!("Chat core is gone, dropping {}", peer);
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
        }
    }

    director.stop();
    if tokio::time::timeout(SHUTDOWN_GRACE, director.wait()).await.is_err() {
        warn!("Actor loops did not stop within {:?}", SHUTDOWN_GRACE);
    }
    info!("Chat server stopped");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Signal received: interrupt"),
        _ = terminate => info!("Signal received: terminate"),
    }
}

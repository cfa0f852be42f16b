//! Chat relay - Entry Point
//!
//! Parses the command line, binds the listener and runs the ChatServer
//! until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatter::{ChatServer, ServerConfig};

#[derive(Parser)]
#[command(name = "chatter")]
#[command(about = "A multi-room line-oriented TCP chat server")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = 4000)]
    port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Write an append-only log per room
    #[arg(short, long)]
    logs: bool,

    /// Directory for room logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chatter=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatter=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::with_addr(format!("{}:{}", cli.bind, cli.port));
    if cli.logs {
        config = config.with_room_logs(cli.log_dir);
    }

    let server = match ChatServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("Waiting for clients on {}", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Server stopped");
    Ok(())
}

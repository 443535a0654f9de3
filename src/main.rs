#[macro_use]
mod macros;

mod error;
mod handler;
mod protocol;
mod server;
mod tools;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracking_sdk::{ClientConfig, TrackingClient};

use crate::handler::{TrackingToolHandler, tool_definitions};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::server::ServerBuilder;

const MAX_REQUEST_SIZE: usize = 1024 * 1024;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .init();
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<(), error::ServerError> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "Tracking MCP server starting");

    let config = ClientConfig::from_env()?;
    let client = TrackingClient::new(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = TrackingToolHandler::new(client, shutdown_rx.clone());
    let server = ServerBuilder::new()
        .with_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .with_tools(tool_definitions())
        .build(handler)?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut shutdown = shutdown_rx;

    loop {
        let raw = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            Ok(_) = shutdown.wait_for(|stop| *stop) => break,
        };
        if raw.trim().is_empty() {
            continue;
        }

        if raw.len() > MAX_REQUEST_SIZE {
            warn!(size = raw.len(), "Request too large");
            write_response(&mut stdout, &JsonRpcResponse::too_large()).await?;
            continue;
        }

        match serde_json::from_str::<JsonRpcRequest>(&raw) {
            Ok(req) => {
                if let Some(resp) = server.handle(req).await {
                    write_response(&mut stdout, &resp).await?;
                }
            }
            Err(err) => {
                error!(error = %err, "Unparseable request");
                write_response(&mut stdout, &JsonRpcResponse::parse_error()).await?;
            }
        }
    }

    info!("Tracking MCP server stopped");
    Ok(())
}

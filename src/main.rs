//! Headless link runner (default binary).
//!
//! Serves the companion link without the game attached: logs everything peers
//! send and echoes an `Init` greeting to each new connection. Useful for
//! bringing up a device against a known-good server.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use echoesphere_link::adapter::{CommunicatorServer, InboundEvent, InboundPayload, LinkConfig};
use echoesphere_link::types::GameEvent;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if LinkConfig::is_disabled() {
        info!("companion link disabled");
        return Ok(());
    }

    let config = LinkConfig::from_env();
    let (server, mut events) = CommunicatorServer::start(config)
        .await
        .context("starting companion link")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => handle(&server, event).await,
                None => break,
            },
        }
    }

    server.shutdown().await;
    Ok(())
}

async fn handle(server: &CommunicatorServer, event: InboundEvent) {
    match event.payload {
        InboundPayload::Connected => {
            let greeting = GameEvent::Init("echoesphere".to_string()).to_string();
            if let Err(e) = server.send_to_client(&event.session_id, &greeting).await {
                warn!(session_id = %event.session_id, error = %e, "greeting failed");
            }
        }
        InboundPayload::Text(text) => {
            info!(session_id = %event.session_id, %text, "message from client");
        }
        InboundPayload::Image(bytes) => {
            info!(session_id = %event.session_id, len = bytes.len(), "image from client");
        }
        InboundPayload::Disconnected { reason } => {
            info!(session_id = %event.session_id, %reason, "client gone");
        }
    }
}

//! Link runtime integration.
//!
//! Bridges the sync game loop with the async TCP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::event::{BroadcastReport, InboundEvent};
use crate::screenshot::ScreenshotProducer;
use crate::server::{CommunicatorServer, InboundEvents};
use crate::types::{GameEvent, HitNote, SessionId};

/// Running link instance owned by a synchronous caller.
///
/// Outbound calls are fire-and-forget: each returns a handle the caller may
/// keep or drop.
pub struct LinkRuntime {
    rt: Runtime,
    server: Arc<CommunicatorServer>,
    events: InboundEvents,
}

impl LinkRuntime {
    /// Start the link with an explicit configuration.
    pub fn start(config: LinkConfig) -> Result<Self, LinkError> {
        let rt = Runtime::new().map_err(LinkError::Runtime)?;
        let (server, events) = rt.block_on(CommunicatorServer::start(config))?;
        Ok(Self {
            rt,
            server: Arc::new(server),
            events,
        })
    }

    /// Start the link from environment variables.
    ///
    /// Returns None if `ECHOESPHERE_LINK_DISABLED` is set.
    pub fn start_from_env() -> Option<Result<Self, LinkError>> {
        if LinkConfig::is_disabled() {
            return None;
        }
        Some(Self::start(LinkConfig::from_env()))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn server(&self) -> &Arc<CommunicatorServer> {
        &self.server
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.events.try_recv().ok()
    }

    /// Everything queued right now, in arrival order.
    pub fn drain(&mut self) -> Vec<InboundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn broadcast_text(
        &self,
        message: impl Into<String>,
    ) -> JoinHandle<Result<BroadcastReport, LinkError>> {
        let server = Arc::clone(&self.server);
        let message = message.into();
        self.rt.spawn(async move { server.broadcast_text(&message).await })
    }

    pub fn broadcast_event(
        &self,
        event: GameEvent,
    ) -> JoinHandle<Result<BroadcastReport, LinkError>> {
        let server = Arc::clone(&self.server);
        self.rt.spawn(async move { server.broadcast_event(&event).await })
    }

    pub fn send_to_client(
        &self,
        id: SessionId,
        message: impl Into<String>,
    ) -> JoinHandle<Result<(), LinkError>> {
        let server = Arc::clone(&self.server);
        let message = message.into();
        self.rt.spawn(async move { server.send_to_client(&id, &message).await })
    }

    pub fn broadcast_screenshot(
        &self,
        producer: Arc<dyn ScreenshotProducer>,
    ) -> JoinHandle<Result<BroadcastReport, LinkError>> {
        let server = Arc::clone(&self.server);
        self.rt.spawn(async move { server.broadcast_screenshot(producer.as_ref()).await })
    }

    /// Announce a block hit, then follow it with a screenshot of the frame that
    /// shows it.
    pub fn on_block_hit(
        &self,
        note: HitNote,
        producer: Arc<dyn ScreenshotProducer>,
    ) -> JoinHandle<Result<BroadcastReport, LinkError>> {
        let server = Arc::clone(&self.server);
        self.rt.spawn(async move {
            if let Err(e) = server.broadcast_event(&GameEvent::HitBlock(note)).await {
                warn!(error = %e, note = %note, "hit broadcast failed");
            }
            server.broadcast_screenshot(producer.as_ref()).await
        })
    }

    /// Block until the server has stopped and every session is closed.
    pub fn shutdown(self) {
        let server = Arc::clone(&self.server);
        self.rt.block_on(async move { server.shutdown().await });
    }
}

//! TCP server for companion devices
//!
//! Handles incoming connections and manages client lifecycle.
//! Uses tokio for async networking.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::codec::encode_header;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::event::{BroadcastReport, InboundEvent, InboundPayload};
use crate::registry::SessionRegistry;
use crate::screenshot::ScreenshotProducer;
use crate::session::{run_receive_loop, ClientSession};
use crate::types::{FrameType, GameEvent, SessionId};
use crate::wire_log::WireLog;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Receiver for inbound events. There is exactly one per server.
pub type InboundEvents = mpsc::Receiver<InboundEvent>;

/// State shared between the server and its sessions.
///
/// Sessions hold it weakly: it is used for deregistration and event delivery,
/// never to keep the server alive.
pub(crate) struct LinkShared {
    pub(crate) registry: SessionRegistry,
    pub(crate) shutdown: CancellationToken,
    events_tx: mpsc::Sender<InboundEvent>,
    wire_log: Option<WireLog>,
}

impl LinkShared {
    pub(crate) fn new(
        max_pending_events: usize,
        wire_log: Option<WireLog>,
    ) -> (Arc<Self>, InboundEvents) {
        let (events_tx, events_rx) = mpsc::channel(max_pending_events.max(1));
        let shared = Arc::new(Self {
            registry: SessionRegistry::new(),
            shutdown: CancellationToken::new(),
            events_tx,
            wire_log,
        });
        (shared, events_rx)
    }

    /// Queue an event, waiting for capacity. Returns false if `cancel` fired
    /// first.
    pub(crate) async fn deliver(&self, event: InboundEvent, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            sent = self.events_tx.send(event) => {
                if sent.is_err() {
                    debug!("inbound consumer dropped; discarding event");
                }
                true
            }
        }
    }

    /// Wait for one slot in the inbound queue. None once the consumer is gone.
    pub(crate) async fn reserve(&self) -> Option<mpsc::Permit<'_, InboundEvent>> {
        self.events_tx.reserve().await.ok()
    }

    /// Queue a notice without waiting. Dropped if the queue is full.
    pub(crate) fn notify(&self, event: InboundEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(session_id = %event.session_id, "inbound queue full; notice dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("inbound consumer dropped; discarding notice");
            }
        }
    }
}

/// The companion link server.
///
/// Owns the listening socket, the accept loop and the session registry, and is
/// the only producer of [`InboundEvent`]s.
pub struct CommunicatorServer {
    shared: Arc<LinkShared>,
    local_addr: SocketAddr,
    tasks: TaskTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl CommunicatorServer {
    /// Bind the listening socket and start accepting.
    ///
    /// Returns the server together with the single inbound event receiver.
    pub async fn start(config: LinkConfig) -> Result<(Self, InboundEvents), LinkError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| LinkError::BindFailed {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| LinkError::BindFailed { addr, source })?;
        info!(%local_addr, "companion link listening");

        let wire_log = config.wire_log_path.clone().map(WireLog::spawn);
        let (shared, events) = LinkShared::new(config.max_pending_events, wire_log);
        let tasks = TaskTracker::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&shared),
            tasks.clone(),
            config.max_frame_len,
        ));

        let server = Self {
            shared,
            local_addr,
            tasks,
            accept_task: Mutex::new(Some(accept_task)),
            stopped: AtomicBool::new(false),
        };
        Ok((server, events))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.shared.registry.ids().await
    }

    pub async fn session_count(&self) -> usize {
        self.shared.registry.len().await
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.shared.registry.contains(id).await
    }

    pub async fn session(&self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.shared.registry.get(id).await
    }

    /// Send a text message to every connected peer.
    pub async fn broadcast_text(&self, message: &str) -> Result<BroadcastReport, LinkError> {
        self.broadcast_frame(FrameType::Text, message.as_bytes()).await
    }

    /// Broadcast a game event as its text form.
    pub async fn broadcast_event(&self, event: &GameEvent) -> Result<BroadcastReport, LinkError> {
        self.broadcast_text(&event.to_string()).await
    }

    /// Send an encoded image to every connected peer.
    pub async fn broadcast_image(&self, image: &[u8]) -> Result<BroadcastReport, LinkError> {
        self.broadcast_frame(FrameType::Image, image).await
    }

    /// Send a text message to one peer.
    pub async fn send_to_client(&self, id: &SessionId, message: &str) -> Result<(), LinkError> {
        let Some(session) = self.shared.registry.get(id).await else {
            warn!(session_id = %id, "send to unknown client");
            return Err(LinkError::UnknownClient(id.clone()));
        };
        session.send_text(message).await
    }

    /// Wait for the current frame to finish rendering, capture it, and send it to
    /// each peer in turn.
    ///
    /// Each send completes before the next one starts, so at most one encoded
    /// image is in flight and every peer sees screenshots in the same order.
    pub async fn broadcast_screenshot<P>(&self, producer: &P) -> Result<BroadcastReport, LinkError>
    where
        P: ScreenshotProducer + ?Sized,
    {
        tokio::select! {
            _ = self.shared.shutdown.cancelled() => return Ok(BroadcastReport::default()),
            _ = producer.wait_for_frame_end() => {}
        }

        let image = producer
            .capture_frame()
            .await
            .map_err(LinkError::CaptureFailed)?;
        debug!(len = image.len(), "screenshot captured");

        self.broadcast_frame(FrameType::Image, &image).await
    }

    async fn broadcast_frame(
        &self,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<BroadcastReport, LinkError> {
        encode_header(frame_type, payload.len())?;

        let sessions = self.shared.registry.snapshot_values().await;
        let mut report = BroadcastReport::default();
        for session in sessions {
            if self.shared.shutdown.is_cancelled() {
                break;
            }
            match session.send_frame(frame_type, payload).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "broadcast send failed");
                    report.failed.push(session.id().clone());
                }
            }
        }

        debug!(
            frame_type = %frame_type,
            len = payload.len(),
            delivered = report.delivered,
            failed = report.failed.len(),
            "broadcast"
        );
        Ok(report)
    }

    /// Stop accepting, close every session and wait for their tasks. Calling it
    /// again is a no-op.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(local_addr = %self.local_addr, "companion link shutting down");

        self.shared.shutdown.cancel();
        if let Some(handle) = self.accept_task.lock().await.take() {
            let _ = handle.await;
        }

        for session in self.shared.registry.drain().await {
            session.close().await;
        }

        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for CommunicatorServer {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<LinkShared>,
    tasks: TaskTracker,
    max_frame_len: usize,
) {
    loop {
        let accepted = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, addr)) => register(socket, addr, &shared, &tasks, max_frame_len).await,
            Err(e) => {
                if shared.shutdown.is_cancelled() {
                    break;
                }
                warn!(error = %e, "accept failed");
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }
    debug!("accept loop stopped");
}

/// Build a session for an accepted socket, register it and start its receive loop.
async fn register(
    socket: TcpStream,
    addr: SocketAddr,
    shared: &Arc<LinkShared>,
    tasks: &TaskTracker,
    max_frame_len: usize,
) {
    if let Err(e) = socket.set_nodelay(true) {
        debug!(peer = %addr, error = %e, "failed to set TCP_NODELAY");
    }

    let id = SessionId::from_peer(addr);
    let (reader, writer) = socket.into_split();
    let session = Arc::new(ClientSession::new(
        id.clone(),
        addr,
        Box::new(writer),
        shared.shutdown.child_token(),
        Arc::downgrade(shared),
        shared.wire_log.clone(),
    ));
    session.mark_connected();

    if !shared.registry.add(id.clone(), Arc::clone(&session)).await {
        warn!(session_id = %id, "duplicate session id; dropping connection");
        session.close().await;
        return;
    }

    info!(session_id = %id, "client connected");
    shared.notify(InboundEvent::new(id, InboundPayload::Connected));
    tasks.spawn(run_receive_loop(session, reader, max_frame_len));
}

//! One accepted peer connection.
//!
//! A session owns the write half of its socket behind an async mutex, so that
//! concurrent broadcast, unicast and screenshot sends never interleave bytes of
//! two frames. The read half lives inside [`run_receive_loop`], which decodes
//! frames, forwards them to the server's inbound channel and tears the session
//! down when the connection ends.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::Permit;
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{encode_header, CodecError, FrameCodec, RawFrame};
use crate::error::{CloseReason, LinkError};
use crate::event::{InboundEvent, InboundPayload};
use crate::server::LinkShared;
use crate::types::{FrameType, SessionId};
use crate::wire_log::{Direction, WireLog};

/// Outbound half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Session liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Connected,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Server-side representation of one peer.
pub struct ClientSession {
    id: SessionId,
    peer_addr: SocketAddr,
    writer: Mutex<Option<BoxedWriter>>,
    state: AtomicU8,
    cancel: CancellationToken,
    link: Weak<LinkShared>,
    wire_log: Option<WireLog>,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl ClientSession {
    pub(crate) fn new(
        id: SessionId,
        peer_addr: SocketAddr,
        writer: BoxedWriter,
        cancel: CancellationToken,
        link: Weak<LinkShared>,
        wire_log: Option<WireLog>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            writer: Mutex::new(Some(writer)),
            state: AtomicU8::new(SessionState::Connecting as u8),
            cancel,
            link,
            wire_log,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub(crate) fn mark_connected(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Connected as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closing` unless already closing or closed.
    fn begin_closing(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < SessionState::Closing as u8).then_some(SessionState::Closing as u8)
            })
            .is_ok()
    }

    pub async fn send_text(&self, text: &str) -> Result<(), LinkError> {
        self.send_frame(FrameType::Text, text.as_bytes()).await
    }

    pub async fn send_image(&self, bytes: &[u8]) -> Result<(), LinkError> {
        self.send_frame(FrameType::Image, bytes).await
    }

    /// Write one frame, holding the session's write lock for the whole frame.
    ///
    /// A failed write leaves the stream mid-frame, so the writer is dropped and
    /// later sends fail fast. The receive loop is left running.
    pub async fn send_frame(
        &self,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let header = encode_header(frame_type, payload.len())?;

        let mut guard = self.writer.lock().await;
        if !self.is_connected() {
            return Err(LinkError::send_failed(&self.id, not_connected()));
        }
        let Some(writer) = guard.as_mut() else {
            return Err(LinkError::send_failed(&self.id, not_connected()));
        };

        let write = async {
            writer.write_all(&header).await?;
            writer.write_all(payload).await?;
            writer.flush().await
        };
        let result = tokio::select! {
            r = write => r,
            _ = self.cancel.cancelled() => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "session closing",
            )),
        };

        match result {
            Ok(()) => {
                drop(guard);
                if let Some(log) = &self.wire_log {
                    log.record(&self.id, Direction::Out, frame_type, payload.len());
                }
                Ok(())
            }
            Err(e) => {
                guard.take();
                drop(guard);
                warn!(session_id = %self.id, frame_type = %frame_type, error = %e, "send failed");
                Err(LinkError::send_failed(&self.id, e))
            }
        }
    }

    /// Close the session: stop its receive loop, leave the registry, release the
    /// socket. Calling it again is a no-op.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.teardown().await;
    }

    /// Runs the `Closing -> Closed` transition once.
    async fn teardown(&self) {
        if !self.begin_closing() {
            return;
        }

        if let Some(link) = self.link.upgrade() {
            link.registry.remove_session(self).await;
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }

        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }

    /// Turn one decoded frame into an inbound payload, or None if it is
    /// discarded.
    fn accept_frame(&self, raw: RawFrame) -> Option<InboundPayload> {
        let type_byte = raw.type_byte;
        let len = raw.payload.len();
        let frame = match raw.into_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.id, type_byte, len, error = %e, "discarding frame");
                return None;
            }
        };

        if let Some(log) = &self.wire_log {
            log.record(&self.id, Direction::In, frame.frame_type, len);
        }

        match frame.frame_type {
            FrameType::Text => match std::str::from_utf8(&frame.payload) {
                Ok(text) => {
                    debug!(session_id = %self.id, len, "text frame received");
                    Some(InboundPayload::Text(text.to_owned()))
                }
                Err(e) => {
                    warn!(
                        session_id = %self.id,
                        len,
                        error = %e,
                        "discarding text frame with invalid utf-8"
                    );
                    None
                }
            },
            FrameType::Image => {
                debug!(session_id = %self.id, len, "image frame received");
                Some(InboundPayload::Image(frame.payload))
            }
        }
    }
}

fn not_connected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "session is not connected")
}

async fn reserve(link: Option<&LinkShared>) -> Option<Permit<'_, InboundEvent>> {
    match link {
        Some(link) => link.reserve().await,
        None => None,
    }
}

/// Read frames until the connection ends, then tear the session down.
///
/// Decoded events wait in a per-session backlog while the inbound queue is
/// full. The socket keeps being read meanwhile, so a peer that hangs up is
/// deregistered at once regardless of how fast the consumer drains.
pub(crate) async fn run_receive_loop<R>(
    session: Arc<ClientSession>,
    reader: R,
    max_frame_len: usize,
) where
    R: AsyncRead + Unpin,
{
    let link = session.link.upgrade();
    let mut frames = FramedRead::new(reader, FrameCodec::with_max_frame_len(max_frame_len));
    let mut backlog: VecDeque<InboundEvent> = VecDeque::new();

    let reason = loop {
        let has_backlog = !backlog.is_empty();
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break CloseReason::Shutdown,
            permit = reserve(link.as_deref()), if has_backlog => match permit {
                Some(permit) => {
                    if let Some(event) = backlog.pop_front() {
                        permit.send(event);
                    }
                }
                None => {
                    debug!(
                        session_id = %session.id,
                        dropped = backlog.len(),
                        "inbound consumer gone"
                    );
                    backlog.clear();
                }
            },
            next = frames.next() => match next {
                None => {
                    let pending = frames.read_buffer().len();
                    if pending > 0 {
                        debug!(session_id = %session.id, pending, "peer closed mid-frame");
                    }
                    break CloseReason::PeerClosed;
                }
                Some(Err(CodecError::Io(e))) => break CloseReason::Io(e),
                Some(Err(e)) => break CloseReason::Protocol(e),
                Some(Ok(raw)) => {
                    if let Some(payload) = session.accept_frame(raw) {
                        backlog.push_back(InboundEvent::new(session.id.clone(), payload));
                    }
                }
            },
        }
    };
    drop(frames);

    finish(&session, link.as_deref(), backlog, reason).await;
}

/// Close the session, then hand over whatever it still owes the consumer,
/// ending with `Disconnected`.
async fn finish(
    session: &ClientSession,
    link: Option<&LinkShared>,
    backlog: VecDeque<InboundEvent>,
    reason: CloseReason,
) {
    session.close().await;

    if reason.is_normal() {
        info!(session_id = %session.id, peer = %session.peer_addr, %reason, "client disconnected");
    } else {
        warn!(session_id = %session.id, peer = %session.peer_addr, %reason, "client dropped");
    }

    let Some(link) = link else {
        return;
    };
    let farewell = InboundEvent::new(
        session.id.clone(),
        InboundPayload::Disconnected {
            reason: reason.to_string(),
        },
    );
    for event in backlog.into_iter().chain(std::iter::once(farewell)) {
        if !link.deliver(event, &link.shutdown).await {
            break;
        }
    }
}

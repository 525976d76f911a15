//! Values exchanged between the link and the game loop.

use bytes::Bytes;

use crate::types::SessionId;

/// Event delivered to the single inbound consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub session_id: SessionId,
    pub payload: InboundPayload,
}

/// Inbound event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// Decoded text frame from the peer.
    Text(String),
    /// Image frame from the peer. Not consumed by game logic.
    Image(Bytes),
    /// Session registered and its receive loop started.
    Connected,
    /// Session left the registry.
    Disconnected { reason: String },
}

impl InboundEvent {
    pub fn new(session_id: SessionId, payload: InboundPayload) -> Self {
        Self {
            session_id,
            payload,
        }
    }

    /// Text payload, if this is a message from the peer.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            InboundPayload::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Outcome of a fan-out to every registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<SessionId>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

//! Adapter module - companion device link over framed TCP
//!
//! This module lets companion devices (a Raspberry Pi driving LEDs, a second
//! screen) follow the game: the game broadcasts short text events and JPEG
//! screenshots, and devices may send text back.
//!
//! # Protocol Overview
//!
//! Every message is one binary frame:
//!
//! ```text
//! +----------------+-----------+-------------------+
//! | length: u32 BE | type: u8  | payload           |
//! +----------------+-----------+-------------------+
//!   length = 1 + payload length
//! ```
//!
//! - **0x00 text**: UTF-8, e.g. `HitBlockColor: Red`
//! - **0x01 image**: encoded JPEG bytes
//!
//! Frames of unknown type are skipped; the connection stays open.
//!
//! # Lifecycle
//!
//! 1. **Start**: [`CommunicatorServer::start`] binds (default 127.0.0.1:65432)
//!    and begins accepting
//! 2. **Sessions**: each accepted peer becomes a [`ClientSession`] keyed by its
//!    `ip:port`, with its own receive loop
//! 3. **Outbound**: broadcast text/images, unicast text, or capture and
//!    broadcast a screenshot after the current frame ends
//! 4. **Inbound**: peer messages arrive on a single [`InboundEvents`] receiver
//! 5. **Shutdown**: stops the accept loop and closes every session
//!
//! # Environment Variables
//!
//! See [`config`]:
//!
//! - `ECHOESPHERE_LINK_HOST`: Bind address (default: "127.0.0.1")
//! - `ECHOESPHERE_LINK_PORT`: Port number (default: 65432)
//! - `ECHOESPHERE_LINK_DISABLED`: Set to "1" or "true" to disable the link entirely
//!
//! # Implementation
//!
//! - Uses **tokio** for async networking
//! - A session's sends are serialized by a per-session lock, so frames never interleave
//! - Broadcasts iterate a snapshot of the registry; one failing peer does not
//!   affect the others
//! - See [`server`] for the TCP server and [`runtime`] for the bridge to a
//!   synchronous game loop

pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod runtime;
pub mod screenshot;
pub mod server;
pub mod session;
pub mod wire_log;

pub use echoesphere_codec as codec;
pub use echoesphere_types as types;

pub use config::{check_tcp_listen_available, LinkConfig};
pub use error::{CloseReason, LinkError};
pub use event::{BroadcastReport, InboundEvent, InboundPayload};
pub use registry::SessionRegistry;
pub use runtime::LinkRuntime;
pub use screenshot::{FrameSignal, ScreenshotProducer, StaticScreenshot};
pub use server::{CommunicatorServer, InboundEvents};
pub use session::{ClientSession, SessionState};
pub use wire_log::{Direction, WireLog, WireRecord};

//! Echoesphere companion link (workspace facade crate).
//!
//! This package exposes `echoesphere_link::{adapter,codec,types}` while the
//! implementation lives in dedicated crates under `crates/`.

pub use echoesphere_adapter as adapter;
pub use echoesphere_codec as codec;
pub use echoesphere_types as types;

//! Neovim msgpack-RPC session layer.
//!
//! Provides the transport the driver rides on and the typed RPC surface
//! built on top of it.
//!
//! # Architecture
//!
//! - `Session`: Transport contract (`request`), implemented by `RpcSession`
//!   and by test doubles
//! - `SessionEvent`: Notifications, engine requests and disconnects,
//!   delivered in arrival order over an mpsc channel
//! - `RpcSession`: msgpack-RPC over any async byte stream
//! - `NvimApi`: Typed wrappers for the `nvim_*` methods the driver uses
//! - `value`: Helpers for reading untyped msgpack values

mod api;
mod client;
mod session;
pub mod value;

pub use api::NvimApi;
pub use client::RpcSession;
pub use session::{Responder, Session, SessionEvent};

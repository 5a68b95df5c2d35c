//! nvim-ui-driver - Neovim UI protocol driver
//!
//! Attaches to Neovim as an external UI over msgpack-RPC, turns `redraw`
//! notifications into ordered UI actions and keeps buffer content in sync
//! for a front-end.

pub mod attach;
pub mod bell;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod events;
pub mod geometry;
pub mod nvim;
pub mod plugin;
pub mod redraw;
pub mod scroll;

#[cfg(test)]
mod testing;

pub use driver::{UiDriver, UiDriverBuilder};
pub use error::DriverError;

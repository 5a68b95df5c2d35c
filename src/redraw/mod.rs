//! Redraw notification handling.
//!
//! - `decode`: Wire batches to [`RedrawCommand`]s
//! - `interpreter`: Commands to ordered [`UiAction`]s and [`RedrawEvent`]s
//! - `action`: Output types and the [`RedrawSink`] contract
//! - `screen`: Reference cell grid that applies actions

mod action;
mod decode;
mod interpreter;
mod screen;

pub use action::{
    Color, HighlightAttributes, PopupMenuItem, PopupMenuState, RedrawEvent, RedrawOutput,
    RedrawSink, Tab, TablineState, UiAction,
};
pub use decode::{decode_batch, RedrawCommand};
pub use interpreter::{apply, interpret};
pub use screen::{Cell, Screen, MAX_CELLS};

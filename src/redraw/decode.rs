//! Decoding of `redraw` notification batches.
//!
//! Each batch on the wire is `[name, tuple, tuple, ...]`. It is decoded
//! once into a [`RedrawCommand`] so nothing downstream touches untyped
//! values. Which tuple a command reads is part of the protocol: most
//! commands take the first, `put` takes all of them, and `highlight_set`
//! and `mode_change` take the last because the engine may send a partial
//! tuple followed by the authoritative one.

use rmpv::Value;

use super::action::{
    Color, HighlightAttributes, PopupMenuItem, PopupMenuState, Tab, TablineState,
};
use crate::error::DriverError;
use crate::nvim::value::{arg, as_array, as_handle, as_i64, as_string, map_flag, map_get};

/// A decoded redraw batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedrawCommand {
    CursorGoto { row: i64, col: i64 },
    Put(Vec<String>),
    SetScrollRegion {
        top: i64,
        bottom: i64,
        left: i64,
        right: i64,
    },
    Scroll(i64),
    HighlightSet(HighlightAttributes),
    Resize { cols: i64, rows: i64 },
    SetTitle(String),
    SetIcon,
    EolClear,
    Clear,
    MouseOn,
    MouseOff,
    UpdateBg(Option<Color>),
    UpdateFg(Option<Color>),
    UpdateSp(Option<Color>),
    ModeChange(String),
    PopupmenuShow(PopupMenuState),
    PopupmenuSelect(i64),
    PopupmenuHide,
    TablineUpdate(TablineState),
    Bell,
    VisualBell,
    BusyStart,
    BusyStop,
    Flush,
    /// A name this driver does not know.
    Unknown(String),
}

impl RedrawCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &str {
        match self {
            Self::CursorGoto { .. } => "cursor_goto",
            Self::Put(_) => "put",
            Self::SetScrollRegion { .. } => "set_scroll_region",
            Self::Scroll(_) => "scroll",
            Self::HighlightSet(_) => "highlight_set",
            Self::Resize { .. } => "resize",
            Self::SetTitle(_) => "set_title",
            Self::SetIcon => "set_icon",
            Self::EolClear => "eol_clear",
            Self::Clear => "clear",
            Self::MouseOn => "mouse_on",
            Self::MouseOff => "mouse_off",
            Self::UpdateBg(_) => "update_bg",
            Self::UpdateFg(_) => "update_fg",
            Self::UpdateSp(_) => "update_sp",
            Self::ModeChange(_) => "mode_change",
            Self::PopupmenuShow(_) => "popupmenu_show",
            Self::PopupmenuSelect(_) => "popupmenu_select",
            Self::PopupmenuHide => "popupmenu_hide",
            Self::TablineUpdate(_) => "tabline_update",
            Self::Bell => "bell",
            Self::VisualBell => "visual_bell",
            Self::BusyStart => "busy_start",
            Self::BusyStop => "busy_stop",
            Self::Flush => "flush",
            Self::Unknown(name) => name,
        }
    }
}

/// Decode one `[name, tuple...]` batch.
pub fn decode_batch(batch: &Value) -> Result<RedrawCommand, DriverError> {
    let parts = as_array(batch, "redraw batch")?;
    let (name, tuples) = parts
        .split_first()
        .ok_or_else(|| DriverError::decode("empty redraw batch"))?;
    let name = as_string(name, "redraw command name")?;

    let command = match name.as_str() {
        "cursor_goto" => {
            let t = first(&name, tuples)?;
            RedrawCommand::CursorGoto {
                row: as_i64(arg(t, 0, "row")?, "row")?,
                col: as_i64(arg(t, 1, "col")?, "col")?,
            }
        }
        "put" => RedrawCommand::Put(
            tuples
                .iter()
                .map(|t| {
                    let t = as_array(t, "put tuple")?;
                    as_string(arg(t, 0, "text")?, "text")
                })
                .collect::<Result<_, _>>()?,
        ),
        "set_scroll_region" => {
            let t = first(&name, tuples)?;
            RedrawCommand::SetScrollRegion {
                top: as_i64(arg(t, 0, "top")?, "top")?,
                bottom: as_i64(arg(t, 1, "bottom")?, "bottom")?,
                left: as_i64(arg(t, 2, "left")?, "left")?,
                right: as_i64(arg(t, 3, "right")?, "right")?,
            }
        }
        "scroll" => {
            let t = first(&name, tuples)?;
            RedrawCommand::Scroll(as_i64(arg(t, 0, "count")?, "count")?)
        }
        "highlight_set" => {
            let t = last(&name, tuples)?;
            RedrawCommand::HighlightSet(decode_highlight(arg(t, 0, "attributes")?)?)
        }
        "resize" => {
            let t = first(&name, tuples)?;
            RedrawCommand::Resize {
                cols: as_i64(arg(t, 0, "cols")?, "cols")?,
                rows: as_i64(arg(t, 1, "rows")?, "rows")?,
            }
        }
        "set_title" => {
            let t = first(&name, tuples)?;
            RedrawCommand::SetTitle(as_string(arg(t, 0, "title")?, "title")?)
        }
        "set_icon" => RedrawCommand::SetIcon,
        "eol_clear" => RedrawCommand::EolClear,
        "clear" => RedrawCommand::Clear,
        "mouse_on" => RedrawCommand::MouseOn,
        "mouse_off" => RedrawCommand::MouseOff,
        "update_bg" => RedrawCommand::UpdateBg(color_arg(&name, tuples)?),
        "update_fg" => RedrawCommand::UpdateFg(color_arg(&name, tuples)?),
        "update_sp" => RedrawCommand::UpdateSp(color_arg(&name, tuples)?),
        "mode_change" => {
            let t = last(&name, tuples)?;
            RedrawCommand::ModeChange(as_string(arg(t, 0, "mode")?, "mode")?)
        }
        "popupmenu_show" => RedrawCommand::PopupmenuShow(decode_popupmenu(first(&name, tuples)?)?),
        "popupmenu_select" => {
            let t = first(&name, tuples)?;
            RedrawCommand::PopupmenuSelect(as_i64(arg(t, 0, "selected")?, "selected")?)
        }
        "popupmenu_hide" => RedrawCommand::PopupmenuHide,
        "tabline_update" => RedrawCommand::TablineUpdate(decode_tabline(first(&name, tuples)?)?),
        "bell" => RedrawCommand::Bell,
        "visual_bell" => RedrawCommand::VisualBell,
        "busy_start" => RedrawCommand::BusyStart,
        "busy_stop" => RedrawCommand::BusyStop,
        "flush" => RedrawCommand::Flush,
        _ => RedrawCommand::Unknown(name),
    };
    Ok(command)
}

fn first<'a>(name: &str, tuples: &'a [Value]) -> Result<&'a [Value], DriverError> {
    let tuple = tuples
        .first()
        .ok_or_else(|| DriverError::decode(format!("{} has no arguments", name)))?;
    as_array(tuple, name)
}

fn last<'a>(name: &str, tuples: &'a [Value]) -> Result<&'a [Value], DriverError> {
    let tuple = tuples
        .last()
        .ok_or_else(|| DriverError::decode(format!("{} has no arguments", name)))?;
    as_array(tuple, name)
}

fn color_arg(name: &str, tuples: &[Value]) -> Result<Option<Color>, DriverError> {
    let t = first(name, tuples)?;
    Ok(Color::from_engine(as_i64(arg(t, 0, "color")?, "color")?))
}

fn optional_color(attrs: &Value, key: &str) -> Result<Option<Color>, DriverError> {
    match map_get(attrs, key) {
        Some(v) => Ok(Color::from_engine(as_i64(v, key)?)),
        None => Ok(None),
    }
}

fn decode_highlight(attrs: &Value) -> Result<HighlightAttributes, DriverError> {
    if attrs.as_map().is_none() {
        return Err(DriverError::decode(format!(
            "highlight attributes must be a map, got {}",
            attrs
        )));
    }
    Ok(HighlightAttributes {
        bold: map_flag(attrs, "bold"),
        italic: map_flag(attrs, "italic"),
        reverse: map_flag(attrs, "reverse"),
        underline: map_flag(attrs, "underline"),
        undercurl: map_flag(attrs, "undercurl"),
        foreground: optional_color(attrs, "foreground")?,
        background: optional_color(attrs, "background")?,
        special: optional_color(attrs, "special")?,
    })
}

fn decode_popupmenu(t: &[Value]) -> Result<PopupMenuState, DriverError> {
    let items = as_array(arg(t, 0, "items")?, "items")?
        .iter()
        .map(|item| -> Result<PopupMenuItem, DriverError> {
            let fields = as_array(item, "popupmenu item")?;
            Ok(PopupMenuItem {
                word: as_string(arg(fields, 0, "word")?, "word")?,
                kind: as_string(arg(fields, 1, "kind")?, "kind")?,
                menu: as_string(arg(fields, 2, "menu")?, "menu")?,
                info: as_string(arg(fields, 3, "info")?, "info")?,
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(PopupMenuState {
        items,
        selected: as_i64(arg(t, 1, "selected")?, "selected")?,
        row: as_i64(arg(t, 2, "row")?, "row")?,
        col: as_i64(arg(t, 3, "col")?, "col")?,
    })
}

fn decode_tabline(t: &[Value]) -> Result<TablineState, DriverError> {
    let current = as_handle(arg(t, 0, "current tab")?, "current tab")?;
    let tabs = as_array(arg(t, 1, "tabs")?, "tabs")?
        .iter()
        .map(|tab| -> Result<Tab, DriverError> {
            let id = map_get(tab, "tab")
                .ok_or_else(|| DriverError::decode("tab entry has no handle"))?;
            let name = map_get(tab, "name")
                .ok_or_else(|| DriverError::decode("tab entry has no name"))?;
            Ok(Tab {
                id: as_handle(id, "tab")?,
                name: as_string(name, "tab name")?,
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(TablineState { current, tabs })
}

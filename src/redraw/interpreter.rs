//! Redraw interpreter: decoded batches in, ordered UI actions out.

use rmpv::Value;

use super::action::{RedrawEvent, RedrawSink, UiAction};
use super::decode::{decode_batch, RedrawCommand};

/// Interpret the arguments of one `redraw` notification.
///
/// Batches are applied strictly in arrival order. A batch that fails to
/// decode, or names an unknown command, is logged and skipped; the rest
/// of the notification still runs. `RedrawComplete` is always emitted
/// last.
pub fn interpret(batches: &[Value], sink: &mut impl RedrawSink) {
    for batch in batches {
        match decode_batch(batch) {
            Ok(command) => apply(command, sink),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed redraw batch"),
        }
    }
    sink.event(RedrawEvent::RedrawComplete);
}

/// Map one decoded command to its actions and events.
pub fn apply(command: RedrawCommand, sink: &mut impl RedrawSink) {
    match command {
        RedrawCommand::CursorGoto { row, col } => sink.action(UiAction::CursorGoto { row, col }),
        RedrawCommand::Put(text) => sink.action(UiAction::Put { text }),
        RedrawCommand::SetScrollRegion {
            top,
            bottom,
            left,
            right,
        } => sink.action(UiAction::SetScrollRegion {
            top,
            bottom,
            left,
            right,
        }),
        RedrawCommand::Scroll(count) => {
            sink.action(UiAction::Scroll { count });
            sink.event(RedrawEvent::Scrolled);
        }
        RedrawCommand::HighlightSet(attrs) => sink.action(UiAction::SetHighlight(attrs)),
        RedrawCommand::Resize { cols, rows } => sink.action(UiAction::Resize { cols, rows }),
        RedrawCommand::SetTitle(title) => sink.event(RedrawEvent::TitleChanged { title }),
        RedrawCommand::EolClear => sink.action(UiAction::ClearToEndOfLine),
        RedrawCommand::Clear => sink.action(UiAction::Clear),
        RedrawCommand::UpdateBg(color) => sink.action(UiAction::UpdateBackground { color }),
        RedrawCommand::UpdateFg(color) => sink.action(UiAction::UpdateForeground { color }),
        RedrawCommand::UpdateSp(color) => sink.action(UiAction::UpdateSpecial { color }),
        RedrawCommand::ModeChange(mode) => {
            sink.action(UiAction::ChangeMode { mode: mode.clone() });
            sink.event(RedrawEvent::ModeChanged { mode });
        }
        RedrawCommand::PopupmenuShow(state) => sink.event(RedrawEvent::ShowPopupMenu(state)),
        RedrawCommand::PopupmenuSelect(index) => {
            sink.event(RedrawEvent::SelectPopupMenu { index })
        }
        RedrawCommand::PopupmenuHide => sink.event(RedrawEvent::HidePopupMenu),
        RedrawCommand::TablineUpdate(state) => sink.event(RedrawEvent::TablineUpdated(state)),
        RedrawCommand::Bell | RedrawCommand::VisualBell => sink.event(RedrawEvent::Bell),
        // Icon-while-minimized is unsupported; mouse toggles are reserved.
        RedrawCommand::SetIcon
        | RedrawCommand::MouseOn
        | RedrawCommand::MouseOff
        | RedrawCommand::BusyStart
        | RedrawCommand::BusyStop
        | RedrawCommand::Flush => {}
        RedrawCommand::Unknown(name) => {
            tracing::warn!(command = %name, "Unknown redraw command")
        }
    }
}

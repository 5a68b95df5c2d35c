//! UI actions and side-channel events produced by the interpreter.

use serde::Serialize;

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    /// Engine color value; negative means "use the default".
    pub fn from_engine(value: i64) -> Option<Self> {
        u32::try_from(value).ok().map(|v| Self(v & 0x00ff_ffff))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Attributes applied to subsequent `put`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightAttributes {
    pub bold: bool,
    pub italic: bool,
    pub reverse: bool,
    pub underline: bool,
    pub undercurl: bool,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub special: Option<Color>,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupMenuItem {
    pub word: String,
    pub kind: String,
    pub menu: String,
    pub info: String,
}

/// External popup menu contents and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupMenuState {
    pub items: Vec<PopupMenuItem>,
    /// Selected item, `-1` for none.
    pub selected: i64,
    pub row: i64,
    pub col: i64,
}

/// Tab page entry of an external tabline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub id: i64,
    pub name: String,
}

/// External tabline contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablineState {
    pub current: i64,
    pub tabs: Vec<Tab>,
}

/// Screen mutation for the front-end to apply, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiAction {
    CursorGoto { row: i64, col: i64 },
    /// Text written cell by cell at the cursor, advancing it.
    Put { text: Vec<String> },
    SetScrollRegion {
        top: i64,
        bottom: i64,
        left: i64,
        right: i64,
    },
    /// Positive counts move content up.
    Scroll { count: i64 },
    SetHighlight(HighlightAttributes),
    Resize { cols: i64, rows: i64 },
    ClearToEndOfLine,
    Clear,
    UpdateBackground { color: Option<Color> },
    UpdateForeground { color: Option<Color> },
    UpdateSpecial { color: Option<Color> },
    ChangeMode { mode: String },
}

/// Non-screen effect of a redraw notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RedrawEvent {
    TitleChanged { title: String },
    TablineUpdated(TablineState),
    ModeChanged { mode: String },
    ShowPopupMenu(PopupMenuState),
    SelectPopupMenu { index: i64 },
    HidePopupMenu,
    /// A scroll happened; the scroll-settled debounce should be armed.
    Scrolled,
    Bell,
    /// The whole notification has been interpreted.
    RedrawComplete,
}

/// Receiver of interpreter output.
pub trait RedrawSink {
    fn action(&mut self, action: UiAction);
    fn event(&mut self, event: RedrawEvent);
}

/// Interpreter output in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RedrawOutput {
    Action(UiAction),
    Event(RedrawEvent),
}

impl RedrawSink for Vec<RedrawOutput> {
    fn action(&mut self, action: UiAction) {
        self.push(RedrawOutput::Action(action));
    }

    fn event(&mut self, event: RedrawEvent) {
        self.push(RedrawOutput::Event(event));
    }
}

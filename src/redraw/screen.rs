//! In-memory screen model that applies [`UiAction`]s.
//!
//! Front-ends that draw a cell grid can use this as their state.

use super::action::{Color, HighlightAttributes, UiAction};

/// Largest grid a screen will allocate.
pub const MAX_CELLS: usize = 1 << 20;

/// One grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub highlight: HighlightAttributes,
}

impl Cell {
    fn blank() -> Self {
        Self {
            text: " ".to_string(),
            highlight: HighlightAttributes::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
}

/// Cell grid plus cursor, scroll region and current attributes.
#[derive(Debug, Clone)]
pub struct Screen {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: (usize, usize),
    region: Region,
    highlight: HighlightAttributes,
    foreground: Option<Color>,
    background: Option<Color>,
    special: Option<Color>,
    mode: String,
}

impl Screen {
    /// Blank screen of the given size.
    ///
    /// Sizes over [`MAX_CELLS`] cells give an empty screen.
    pub fn new(rows: usize, cols: usize) -> Self {
        let (rows, cols) = if fits(rows, cols) {
            (rows, cols)
        } else {
            tracing::warn!(rows, cols, "Screen size too large, using an empty grid");
            (0, 0)
        };
        Self {
            rows,
            cols,
            cells: vec![Cell::blank(); rows * cols],
            cursor: (0, 0),
            region: Region {
                top: 0,
                bottom: rows.saturating_sub(1),
                left: 0,
                right: cols.saturating_sub(1),
            },
            highlight: HighlightAttributes::default(),
            foreground: None,
            background: None,
            special: None,
            mode: "normal".to_string(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cursor as `(row, col)`.
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Attributes the next `put` will use.
    pub fn highlight(&self) -> &HighlightAttributes {
        &self.highlight
    }

    /// Default colors as `(foreground, background, special)`.
    pub fn default_colors(&self) -> (Option<Color>, Option<Color>, Option<Color>) {
        (self.foreground, self.background, self.special)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Text of one row, trailing blanks included.
    pub fn row_text(&self, row: usize) -> String {
        (0..self.cols)
            .filter_map(|col| self.cell(row, col))
            .map(|cell| cell.text.as_str())
            .collect()
    }

    /// Apply one action.
    pub fn apply(&mut self, action: &UiAction) {
        match action {
            UiAction::CursorGoto { row, col } => {
                self.cursor = (clamp(*row, self.rows), clamp(*col, self.cols));
            }
            UiAction::Put { text } => {
                for cell_text in text {
                    let (row, col) = self.cursor;
                    if col >= self.cols {
                        break;
                    }
                    let highlight = self.highlight.clone();
                    if let Some(cell) = self.cell_mut(row, col) {
                        cell.text.clone_from(cell_text);
                        cell.highlight = highlight;
                    }
                    self.cursor.1 += 1;
                }
            }
            UiAction::SetScrollRegion {
                top,
                bottom,
                left,
                right,
            } => {
                self.region = Region {
                    top: clamp(*top, self.rows),
                    bottom: clamp(*bottom, self.rows),
                    left: clamp(*left, self.cols),
                    right: clamp(*right, self.cols),
                };
            }
            UiAction::Scroll { count } => self.scroll(*count),
            UiAction::SetHighlight(attrs) => self.highlight = attrs.clone(),
            UiAction::Resize { cols, rows } => {
                let (rows, cols) = (clamp_len(*rows), clamp_len(*cols));
                if !fits(rows, cols) {
                    tracing::warn!(rows, cols, "Ignoring oversized resize");
                    return;
                }
                let mode = std::mem::take(&mut self.mode);
                let (fg, bg, sp) = self.default_colors();
                *self = Self::new(rows, cols);
                self.mode = mode;
                self.foreground = fg;
                self.background = bg;
                self.special = sp;
            }
            UiAction::ClearToEndOfLine => {
                let (row, col) = self.cursor;
                for c in col..self.cols {
                    if let Some(cell) = self.cell_mut(row, c) {
                        *cell = Cell::blank();
                    }
                }
            }
            UiAction::Clear => self.cells.fill(Cell::blank()),
            UiAction::UpdateBackground { color } => self.background = *color,
            UiAction::UpdateForeground { color } => self.foreground = *color,
            UiAction::UpdateSpecial { color } => self.special = *color,
            UiAction::ChangeMode { mode } => self.mode.clone_from(mode),
        }
    }

    /// Apply a sequence of actions in order.
    pub fn apply_all<'a>(&mut self, actions: impl IntoIterator<Item = &'a UiAction>) {
        for action in actions {
            self.apply(action);
        }
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        if row < self.rows && col < self.cols {
            self.cells.get_mut(row * self.cols + col)
        } else {
            None
        }
    }

    /// Move the region's content up (`count > 0`) or down, blanking the
    /// rows scrolled in.
    fn scroll(&mut self, count: i64) {
        if self.rows == 0 || self.cols == 0 || count == 0 {
            return;
        }
        let Region {
            top,
            bottom,
            left,
            right,
        } = self.region;
        if top > bottom || left > right {
            return;
        }
        let height = bottom - top + 1;
        let shift = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);

        let source_row = |target: usize| -> Option<usize> {
            let offset = target - top;
            if count > 0 {
                offset.checked_add(shift).filter(|o| *o < height).map(|o| top + o)
            } else {
                offset.checked_sub(shift).map(|o| top + o)
            }
        };

        let targets: Vec<usize> = if count > 0 {
            (top..=bottom).collect()
        } else {
            (top..=bottom).rev().collect()
        };
        for target in targets {
            for col in left..=right {
                let replacement = source_row(target)
                    .and_then(|src| self.cell(src, col).cloned())
                    .unwrap_or_else(Cell::blank);
                if let Some(cell) = self.cell_mut(target, col) {
                    *cell = replacement;
                }
            }
        }
    }
}

fn clamp(value: i64, len: usize) -> usize {
    usize::try_from(value.max(0))
        .unwrap_or(0)
        .min(len.saturating_sub(1))
}

fn fits(rows: usize, cols: usize) -> bool {
    rows.checked_mul(cols).is_some_and(|cells| cells <= MAX_CELLS)
}

fn clamp_len(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(0)
}

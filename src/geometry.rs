//! Pixel-to-grid geometry.
//!
//! Converts front-end pixel sizes into rows and columns using the font's
//! cell size, and decides whether a resize needs to reach the engine.

use serde::Serialize;

use crate::config::FixedSize;

/// Pixel size of one character cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontMetrics {
    pub width: f64,
    pub height: f64,
}

/// Measures character cells for a font. Implemented by the front-end.
pub trait FontMeasurer: Send + Sync {
    fn measure(&self, family: &str, size: f64) -> FontMetrics;
}

/// Measurer for monospace fonts without a font backend: the cell is
/// `size * width_ratio` wide and `size` tall.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasurer {
    pub width_ratio: f64,
}

impl FontMeasurer for MonospaceMeasurer {
    fn measure(&self, _family: &str, size: f64) -> FontMetrics {
        FontMetrics {
            width: size * self.width_ratio,
            height: size,
        }
    }
}

/// Current pixel and grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    pub rows: i64,
    pub cols: i64,
    pub width_px: f64,
    pub height_px: f64,
    pub font_width_px: f64,
    pub font_height_px: f64,
}

/// What a geometry change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Same grid as before; nothing to do.
    Unchanged,
    /// Grid changed but the UI is not attached; remembered for attach.
    Recorded { rows: i64, cols: i64 },
    /// Grid changed on an attached UI; send `nvim_ui_try_resize`.
    Apply { rows: i64, cols: i64 },
}

/// Owns the geometry and the rules for changing it.
pub struct GeometryCoordinator {
    geometry: Geometry,
    fixed_size: Option<FixedSize>,
    measurer: Box<dyn FontMeasurer>,
}

impl GeometryCoordinator {
    pub fn new(measurer: Box<dyn FontMeasurer>, fixed_size: Option<FixedSize>) -> Self {
        Self {
            geometry: Geometry {
                rows: 0,
                cols: 0,
                width_px: 0.0,
                height_px: 0.0,
                font_width_px: 0.0,
                font_height_px: 0.0,
            },
            fixed_size,
            measurer,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Measure a new font and re-run [`resize`](Self::resize) with the
    /// current pixel size.
    pub fn set_font(
        &mut self,
        family: &str,
        size: f64,
        line_padding: f64,
        attached: bool,
    ) -> ResizeOutcome {
        let metrics = self.measurer.measure(family, size);
        self.geometry.font_width_px = metrics.width;
        self.geometry.font_height_px = metrics.height + line_padding;
        tracing::debug!(
            family,
            size,
            cell_width = self.geometry.font_width_px,
            cell_height = self.geometry.font_height_px,
            "Font changed"
        );
        self.resize(self.geometry.width_px, self.geometry.height_px, attached)
    }

    /// Recompute the grid for a pixel size.
    pub fn resize(&mut self, width_px: f64, height_px: f64, attached: bool) -> ResizeOutcome {
        self.geometry.width_px = width_px;
        self.geometry.height_px = height_px;

        let (rows, cols) = match self.fixed_size {
            Some(FixedSize { rows, cols }) => {
                tracing::warn!(rows, cols, "Using fixed grid size from debug config");
                (rows, cols)
            }
            None => (
                cells(height_px, self.geometry.font_height_px),
                cells(width_px, self.geometry.font_width_px),
            ),
        };

        if rows == self.geometry.rows && cols == self.geometry.cols {
            return ResizeOutcome::Unchanged;
        }
        self.geometry.rows = rows;
        self.geometry.cols = cols;

        if attached {
            ResizeOutcome::Apply { rows, cols }
        } else {
            ResizeOutcome::Recorded { rows, cols }
        }
    }
}

fn cells(pixels: f64, cell: f64) -> i64 {
    if cell <= 0.0 || !pixels.is_finite() || pixels <= 0.0 {
        return 0;
    }
    (pixels / cell).floor() as i64
}

//! Buffer content synchronization.
//!
//! Full updates fetch a line range from the engine and republish it as a
//! snapshot. Ranges ending past the ceiling are dropped to bound RPC
//! traffic on large files; that is policy, not an error.

use serde::Serialize;

use crate::config::DEFAULT_MAX_LINES;
use crate::context::EventContext;
use crate::error::DriverError;
use crate::nvim::{NvimApi, Session};

/// New buffer content for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferUpdate {
    /// Replaces everything known about `context`'s buffer.
    Full {
        context: EventContext,
        lines: Vec<String>,
    },
    /// Replaces one line.
    Incremental {
        context: EventContext,
        line_number: i64,
        line_content: String,
    },
}

impl BufferUpdate {
    pub fn context(&self) -> &EventContext {
        match self {
            Self::Full { context, .. } | Self::Incremental { context, .. } => context,
        }
    }
}

/// Applies the line ceiling and fetches full updates.
#[derive(Debug, Clone, Copy)]
pub struct BufferSynchronizer {
    max_lines: i64,
}

impl Default for BufferSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl BufferSynchronizer {
    pub fn new(max_lines: i64) -> Self {
        Self { max_lines }
    }

    pub fn max_lines(&self) -> i64 {
        self.max_lines
    }

    /// Zero-based, end-exclusive range to fetch for 1-based lines
    /// `start_line..=end_line`, or `None` when over the ceiling.
    pub fn fetch_range(&self, start_line: i64, end_line: i64) -> Option<(i64, i64)> {
        if end_line > self.max_lines {
            return None;
        }
        Some(((start_line - 1).max(0), end_line))
    }

    /// Handle a full-update trigger.
    ///
    /// Returns `Ok(None)` when the update is dropped. The buffer is taken
    /// from `context` as captured at trigger time.
    pub async fn on_full_update<S: Session + ?Sized>(
        &self,
        session: &S,
        context: EventContext,
        start_line: i64,
        end_line: i64,
    ) -> Result<Option<BufferUpdate>, DriverError> {
        let Some((start, end)) = self.fetch_range(start_line, end_line) else {
            tracing::debug!(
                end_line,
                max_lines = self.max_lines,
                "Dropping full buffer update over the line ceiling"
            );
            return Ok(None);
        };
        let Some(buffer) = context.buffer_number() else {
            tracing::warn!("Full buffer update without a buffer number");
            return Ok(None);
        };

        let lines = session.buf_get_lines(buffer, start, end, false).await?;
        tracing::debug!(buffer, start, end, count = lines.len(), "Fetched buffer lines");
        Ok(Some(BufferUpdate::Full { context, lines }))
    }
}

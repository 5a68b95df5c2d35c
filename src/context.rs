//! Editor state snapshot attached to plugin notifications.

use rmpv::Value;
use serde::Serialize;

use crate::nvim::value::{as_i64, as_string, map_get};

/// Snapshot of editor state (buffer, cursor, mode ...) sent by the engine
/// alongside plugin notifications.
///
/// Treated as an immutable value: the driver only reads it and threads
/// it through to consumers. Accessors return `None` for absent or
/// mistyped fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventContext(Value);

impl EventContext {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Buffer the event refers to.
    pub fn buffer_number(&self) -> Option<i64> {
        self.int("bufferNumber")
    }

    /// Cursor line (1-based).
    pub fn line(&self) -> Option<i64> {
        self.int("line")
    }

    /// Cursor column (1-based).
    pub fn column(&self) -> Option<i64> {
        self.int("column")
    }

    pub fn mode(&self) -> Option<String> {
        self.string("mode")
    }

    pub fn filetype(&self) -> Option<String> {
        self.string("filetype")
    }

    /// Absolute path of the buffer's file.
    pub fn file_path(&self) -> Option<String> {
        self.string("bufferFullPath")
    }

    /// The raw value as sent by the engine.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn int(&self, key: &str) -> Option<i64> {
        map_get(&self.0, key).and_then(|v| as_i64(v, key).ok())
    }

    fn string(&self, key: &str) -> Option<String> {
        map_get(&self.0, key).and_then(|v| as_string(v, key).ok())
    }
}

impl From<Value> for EventContext {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

//! Decoding of `oni_plugin_notify` notifications.
//!
//! The payload's first argument is `[sub_method, ...sub_args]`. The
//! sub-method is split off as a discriminator and the remainder decoded
//! into a closed [`PluginNotification`]; the payload itself is never
//! modified.

use rmpv::Value;
use serde::Serialize;

use crate::context::EventContext;
use crate::error::DriverError;
use crate::nvim::value::{arg, as_array, as_i64, as_string, map_get, map_string};

/// Register contents captured by a yank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YankInfo {
    pub operator: String,
    pub regcontents: Vec<String>,
    pub regname: String,
    pub regtype: String,
}

impl YankInfo {
    fn decode(value: &Value) -> Result<Self, DriverError> {
        let regcontents = match map_get(value, "regcontents") {
            Some(lines) => as_array(lines, "regcontents")?
                .iter()
                .map(|line| as_string(line, "regcontents line"))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            operator: map_string(value, "operator"),
            regcontents,
            regname: map_string(value, "regname"),
            regtype: map_string(value, "regtype"),
        })
    }
}

/// A decoded plugin notification.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginNotification {
    /// Lines `start_line..=end_line` (1-based) changed; fetch them.
    BufferUpdate {
        context: EventContext,
        start_line: i64,
        end_line: i64,
    },
    /// A single line changed; its new content is included.
    IncrementalBufferUpdate {
        context: EventContext,
        line_content: String,
        line_number: i64,
    },
    Yank(YankInfo),
    /// Command the editor wants the front-end to run.
    Command(String),
    /// Autocommand or lifecycle event.
    Event { name: String, context: EventContext },
    Unknown(String),
}

/// Split `[[sub_method, ...sub_args]]` into the sub-method and its arguments.
pub fn split_discriminator(payload: &[Value]) -> Result<(String, &[Value]), DriverError> {
    let inner = as_array(arg(payload, 0, "plugin notification")?, "plugin notification")?;
    let (method, rest) = inner
        .split_first()
        .ok_or_else(|| DriverError::decode("plugin notification has no method"))?;
    Ok((as_string(method, "plugin method")?, rest))
}

/// Decode an `oni_plugin_notify` payload.
pub fn decode(payload: &[Value]) -> Result<PluginNotification, DriverError> {
    let (method, args) = split_discriminator(payload)?;
    let context = |index: usize| -> Result<EventContext, DriverError> {
        Ok(EventContext::new(arg(args, index, "context")?.clone()))
    };

    let notification = match method.as_str() {
        "buffer_update" => PluginNotification::BufferUpdate {
            context: context(0)?,
            start_line: as_i64(arg(args, 1, "start line")?, "start line")?,
            end_line: as_i64(arg(args, 2, "end line")?, "end line")?,
        },
        "incremental_buffer_update" => PluginNotification::IncrementalBufferUpdate {
            context: context(0)?,
            line_content: as_string(arg(args, 1, "line content")?, "line content")?,
            line_number: as_i64(arg(args, 2, "line number")?, "line number")?,
        },
        "oni_yank" => PluginNotification::Yank(YankInfo::decode(arg(args, 0, "yank info")?)?),
        "oni_command" => {
            PluginNotification::Command(as_string(arg(args, 0, "command")?, "command")?)
        }
        "event" => PluginNotification::Event {
            name: as_string(arg(args, 0, "event name")?, "event name")?,
            context: context(1)?,
        },
        _ => PluginNotification::Unknown(method),
    };
    Ok(notification)
}

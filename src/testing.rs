//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rmpv::Value;

use crate::error::DriverError;
use crate::nvim::Session;

enum Reply {
    Value(Value),
    Engine(String),
    Closed,
}

/// Session that records every request and answers from a per-method script.
///
/// Methods without a scripted reply answer `Nil`.
#[derive(Default)]
pub struct RecordingSession {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    replies: Mutex<HashMap<String, Reply>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` with `value` from now on.
    pub fn reply(self, method: &str, value: Value) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Reply::Value(value));
        self
    }

    /// Fail `method` with an engine error from now on.
    pub fn fail(self, method: &str, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Reply::Engine(message.to_string()));
        self
    }

    /// Fail `method` as if the channel had closed.
    pub fn closed(self, method: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Reply::Closed);
        self
    }

    /// All requests so far, in order.
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests for one method, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn request(&self, method: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), args));
        match self.replies.lock().unwrap().get(method) {
            Some(Reply::Value(value)) => Ok(value.clone()),
            Some(Reply::Engine(message)) => Err(DriverError::Engine(message.clone())),
            Some(Reply::Closed) => Err(DriverError::ChannelClosed),
            None => Ok(Value::Nil),
        }
    }
}

/// `nvim_get_api_info` reply for the given version.
pub fn api_info(major: i64, minor: i64, patch: i64) -> Value {
    Value::Array(vec![
        Value::from(1),
        crate::nvim::value::string_map([(
            "version",
            crate::nvim::value::string_map([
                ("major", Value::from(major)),
                ("minor", Value::from(minor)),
                ("patch", Value::from(patch)),
            ]),
        )]),
    ])
}

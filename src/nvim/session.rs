//! Transport contract between the driver and the engine.

use async_trait::async_trait;
use rmpv::Value;

use crate::error::DriverError;

/// A request/response channel to the engine.
///
/// Implementations own the wire encoding. Events flowing the other way
/// (notifications, engine requests, disconnect) are delivered separately
/// as [`SessionEvent`]s.
#[async_trait]
pub trait Session: Send + Sync {
    /// Sends a request and waits for its result.
    ///
    /// Fails with a transport error when the channel is down or the engine
    /// answers with an error value.
    async fn request(&self, method: &str, args: Vec<Value>) -> Result<Value, DriverError>;
}

/// Something the engine sent without being asked.
#[derive(Debug)]
pub enum SessionEvent {
    /// Fire-and-forget message, e.g. `redraw`.
    Notification { method: String, args: Vec<Value> },
    /// The engine expects an answer through `responder`.
    Request {
        method: String,
        args: Vec<Value>,
        responder: Responder,
    },
    /// The channel closed.
    Disconnect,
}

type ReplyFn = Box<dyn FnOnce(Result<Value, Value>) + Send>;

/// One-shot reply handle for an engine request.
pub struct Responder {
    reply: ReplyFn,
}

impl Responder {
    /// Wraps the function that writes the reply back to the engine.
    pub fn new(reply: impl FnOnce(Result<Value, Value>) + Send + 'static) -> Self {
        Self {
            reply: Box::new(reply),
        }
    }

    /// Answers the request. `Err` is sent as the RPC error value.
    pub fn respond(self, result: Result<Value, Value>) {
        (self.reply)(result)
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

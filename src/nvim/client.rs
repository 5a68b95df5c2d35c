//! Minimal Neovim client for msgpack-RPC communication.
//!
//! Speaks the three message kinds of msgpack-RPC over any async byte
//! stream:
//!
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`
//!
//! A writer task serializes outgoing messages; a reader task decodes
//! incoming ones, resolves pending requests and forwards everything else
//! as [`SessionEvent`]s in arrival order.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rmpv::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use super::session::{Responder, Session, SessionEvent};
use super::value::{as_array, as_i64, as_string, error_message};
use crate::error::DriverError;

const REQUEST: i64 = 0;
const RESPONSE: i64 = 1;
const NOTIFICATION: i64 = 2;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, DriverError>>>>>;

/// Neovim session over msgpack-RPC.
pub struct RpcSession {
    outgoing: mpsc::UnboundedSender<Value>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    msgid: AtomicU64,
}

impl RpcSession {
    /// Connect to a Neovim listening on a Unix socket (`nvim --listen <path>`).
    #[cfg(unix)]
    pub async fn connect_unix(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), DriverError> {
        tracing::debug!(socket = %path.display(), "Connecting to nvim socket");
        let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
            DriverError::Transport(format!("failed to connect to nvim socket: {}", e))
        })?;
        let (reader, writer) = stream.into_split();
        tracing::info!("Connected to Neovim");
        Ok(Self::from_io(reader, writer))
    }

    /// Start a session over an arbitrary reader/writer pair, e.g. the
    /// stdio of an embedded `nvim --embed` child.
    ///
    /// Must be called inside a tokio runtime; the reader and writer tasks
    /// are spawned immediately.
    pub fn from_io<R, W>(reader: R, writer: W) -> (Self, mpsc::UnboundedReceiver<SessionEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(writer, outgoing_rx));
        tokio::spawn(read_loop(
            reader,
            outgoing.clone(),
            events,
            pending.clone(),
            closed.clone(),
        ));

        let session = Self {
            outgoing,
            pending,
            closed,
            msgid: AtomicU64::new(0),
        };
        (session, events_rx)
    }

    /// Check if the channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for RpcSession {
    async fn request(&self, method: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        let msgid = self.msgid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = lock_pending(&self.pending);
            pending.insert(msgid, tx);
        }
        if self.closed.load(Ordering::SeqCst) {
            lock_pending(&self.pending).remove(&msgid);
            return Err(DriverError::ChannelClosed);
        }

        tracing::trace!(msgid, method, "Sending request");
        let message = Value::Array(vec![
            Value::from(REQUEST),
            Value::from(msgid),
            Value::from(method),
            Value::Array(args),
        ]);
        if self.outgoing.send(message).is_err() {
            lock_pending(&self.pending).remove(&msgid);
            return Err(DriverError::ChannelClosed);
        }

        rx.await.map_err(|_| DriverError::ChannelClosed)?
    }
}

fn lock_pending(
    pending: &Pending,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value, DriverError>>>> {
    // A poisoned map still holds valid senders.
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn write_loop<W>(mut writer: W, mut outgoing: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        let mut buf = Vec::new();
        if let Err(e) = rmpv::encode::write_value(&mut buf, &message) {
            tracing::error!(error = %e, "Failed to encode message");
            continue;
        }
        if let Err(e) = writer.write_all(&buf).await {
            tracing::warn!(error = %e, "Failed to write to nvim");
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!(error = %e, "Failed to flush nvim stream");
            break;
        }
    }
    tracing::debug!("RPC writer stopped");
}

async fn read_loop<R>(
    mut reader: R,
    outgoing: mpsc::UnboundedSender<Value>,
    events: mpsc::UnboundedSender<SessionEvent>,
    pending: Pending,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut chunk = vec![0u8; 64 * 1024];

    'read: loop {
        loop {
            match try_decode(&mut buf) {
                Ok(Some(message)) => {
                    if let Err(e) = dispatch(message, &outgoing, &events, &pending) {
                        tracing::warn!(error = %e, "Ignoring malformed RPC message");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Undecodable RPC stream, closing session");
                    break 'read;
                }
            }
        }

        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from nvim");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    for (_, waiter) in lock_pending(&pending).drain() {
        let _ = waiter.send(Err(DriverError::ChannelClosed));
    }
    tracing::debug!("RPC reader stopped");
    let _ = events.send(SessionEvent::Disconnect);
}

/// Decodes one complete message from the front of `buf`, if there is one.
fn try_decode(buf: &mut Vec<u8>) -> Result<Option<Value>, DriverError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let mut cursor = Cursor::new(buf.as_slice());
    match rmpv::decode::read_value(&mut cursor) {
        Ok(value) => {
            let used = cursor.position() as usize;
            buf.drain(..used);
            Ok(Some(value))
        }
        Err(rmpv::decode::Error::InvalidMarkerRead(e))
        | Err(rmpv::decode::Error::InvalidDataRead(e))
            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
        {
            Ok(None)
        }
        Err(e) => Err(DriverError::Transport(format!(
            "failed to decode message: {}",
            e
        ))),
    }
}

fn dispatch(
    message: Value,
    outgoing: &mpsc::UnboundedSender<Value>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    pending: &Pending,
) -> Result<(), DriverError> {
    let parts = as_array(&message, "RPC message")?;
    let kind = as_i64(
        parts
            .first()
            .ok_or_else(|| DriverError::decode("empty RPC message"))?,
        "message type",
    )?;

    match (kind, parts) {
        (RESPONSE, [_, msgid, error, result]) => {
            let msgid = msgid
                .as_u64()
                .ok_or_else(|| DriverError::decode("response msgid must be unsigned"))?;
            let waiter = lock_pending(pending).remove(&msgid);
            let Some(waiter) = waiter else {
                tracing::warn!(msgid, "Response for unknown request");
                return Ok(());
            };
            let outcome = if error.is_nil() {
                Ok(result.clone())
            } else {
                Err(DriverError::Engine(error_message(error)))
            };
            let _ = waiter.send(outcome);
        }
        (NOTIFICATION, [_, method, params]) => {
            let method = as_string(method, "notification method")?;
            let args = as_array(params, "notification params")?.to_vec();
            let _ = events.send(SessionEvent::Notification { method, args });
        }
        (REQUEST, [_, msgid, method, params]) => {
            let msgid = msgid.clone();
            let method = as_string(method, "request method")?;
            let args = as_array(params, "request params")?.to_vec();
            let outgoing = outgoing.clone();
            let responder = Responder::new(move |result| {
                let (error, result) = match result {
                    Ok(value) => (Value::Nil, value),
                    Err(error) => (error, Value::Nil),
                };
                let _ = outgoing.send(Value::Array(vec![
                    Value::from(RESPONSE),
                    msgid,
                    error,
                    result,
                ]));
            });
            let _ = events.send(SessionEvent::Request {
                method,
                args,
                responder,
            });
        }
        _ => {
            return Err(DriverError::decode(format!(
                "unexpected RPC message shape: {}",
                message
            )))
        }
    }
    Ok(())
}

//! Typed event feeds owned by the driver.
//!
//! Every occurrence is delivered exactly once to each live subscriber,
//! in emission order. Subscribers that dropped their receiver are pruned
//! on the next emit.

use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;

use crate::buffer::BufferUpdate;
use crate::context::EventContext;
use crate::error::DriverError;
use crate::plugin::YankInfo;
use crate::redraw::{PopupMenuState, TablineState, UiAction};

/// Fan-out channel for one event type.
pub struct EventFeed<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T> Default for EventFeed<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send + 'static> EventFeed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Same as [`subscribe`](Self::subscribe), as a `Stream`.
    pub fn stream(&self) -> impl Stream<Item = T> + Send + 'static {
        futures::stream::unfold(self.subscribe(), |mut rx| async move {
            rx.recv().await.map(|value| (value, rx))
        })
    }

    /// Deliver `value` to every live subscriber.
    pub fn emit(&self, value: T) {
        self.lock().retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        // Senders stay valid even if a holder panicked.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An autocommand or lifecycle event forwarded from the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorEvent {
    pub name: String,
    pub context: EventContext,
}

/// All feeds a consumer can subscribe to.
#[derive(Default)]
pub struct DriverEvents {
    /// Screen actions from `redraw`, in order.
    pub ui_actions: EventFeed<UiAction>,
    /// Fired once after each `redraw` notification.
    pub redraw_complete: EventFeed<()>,
    pub title: EventFeed<String>,
    pub tabline: EventFeed<TablineState>,
    pub mode_changed: EventFeed<String>,
    pub show_popup_menu: EventFeed<PopupMenuState>,
    pub select_popup_menu: EventFeed<i64>,
    pub hide_popup_menu: EventFeed<()>,
    /// Latest editor context after scrolling stopped.
    pub scroll_settled: EventFeed<EventContext>,
    pub yank: EventFeed<YankInfo>,
    pub buffer_update: EventFeed<BufferUpdate>,
    /// Command strings the editor asked the front-end to run.
    pub external_command: EventFeed<String>,
    pub directory_changed: EventFeed<String>,
    /// The engine is shutting down normally.
    pub leave: EventFeed<()>,
    pub error: EventFeed<Arc<DriverError>>,
    /// Autocommand notifications (consumed by autocommand registries).
    pub autocommand: EventFeed<EditorEvent>,
    /// Every editor event, for generic listeners.
    pub event: EventFeed<EditorEvent>,
}

impl DriverEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error to the error feed.
    pub fn report(&self, error: DriverError) {
        tracing::error!(error = %error, "Driver error");
        self.error.emit(Arc::new(error));
    }
}

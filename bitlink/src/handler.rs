//! Lifecycle event dispatch
//!
//! Every transition of the connection state machine is reported as one
//! [`DeviceEvent`] value, queued in emission order and delivered to the
//! single registered [`DeviceHandler`] on a dedicated task, outside any
//! internal lock. Without a handler, events are logged and dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Error;
use bitlink_proto::MicrobitVersion;

/// A connection lifecycle notification.
#[derive(Debug)]
pub enum DeviceEvent {
    Connecting,
    Initializing,
    Connected(MicrobitVersion),
    Disconnected,
    Reconnecting,
    ConnectError(Error),
    ReconnectError(Error),
    Closed,
}

/// Consumer of lifecycle notifications. Must not block; events arrive on a
/// shared dispatcher task.
pub trait DeviceHandler: Send + Sync {
    fn on_event(&self, event: DeviceEvent);
}

type HandlerSlot = Arc<Mutex<Option<Arc<dyn DeviceHandler>>>>;

pub(crate) struct EventDispatcher {
    tx: mpsc::UnboundedSender<DeviceEvent>,
    handler: HandlerSlot,
    task: JoinHandle<()>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DeviceEvent>();
        let handler: HandlerSlot = Arc::new(Mutex::new(None));
        let slot = handler.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let current = slot.lock().expect("handler slot poisoned").clone();
                match current {
                    Some(handler) => handler.on_event(event),
                    None => tracing::debug!(?event, "no handler registered; dropping event"),
                }
            }
        });
        Self { tx, handler, task }
    }

    /// Replace the registered handler. Takes effect for the next event.
    pub fn set_handler(&self, handler: Arc<dyn DeviceHandler>) {
        *self.handler.lock().expect("handler slot poisoned") = Some(handler);
    }

    pub fn emit(&self, event: DeviceEvent) {
        // The receiver lives as long as the dispatcher; a send can only fail
        // during teardown, where dropping the event is the right outcome.
        let _ = self.tx.send(event);
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

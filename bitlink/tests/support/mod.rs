//! In-memory link provider for lifecycle tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use bitlink::proto::gatt;
use bitlink::{
    DeviceConfig, DeviceEvent, DeviceHandler, Error, Link, LinkError, LinkFilter, LinkProvider,
    Microbit, Notification,
};

pub fn u(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap()
}

pub struct MockLink {
    model: u32,
    name: String,
    connected: AtomicBool,
    fail_subscribe: HashSet<Uuid>,
    pub subscribed: Mutex<Vec<Uuid>>,
    pub writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    notif_tx: mpsc::UnboundedSender<Notification>,
    notif_rx: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
    closed: Notify,
}

impl MockLink {
    fn new(model: u32, fail_subscribe: HashSet<Uuid>) -> Self {
        let (notif_tx, notif_rx) = mpsc::unbounded_channel();
        Self {
            model,
            name: format!("{} [zuvot]", gatt::NAME_PREFIX),
            connected: AtomicBool::new(true),
            fail_subscribe,
            subscribed: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            notif_tx,
            notif_rx: Mutex::new(Some(notif_rx)),
            closed: Notify::new(),
        }
    }

    /// Push a notification as if the peripheral had sent it.
    pub fn notify(&self, characteristic: &str, value: Vec<u8>) {
        let _ = self.notif_tx.send(Notification {
            characteristic: u(characteristic),
            value,
        });
    }

    /// Simulate an unexpected link drop.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.notify_one();
    }

    pub fn is_released(&self) -> bool {
        !self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Link for MockLink {
    fn id(&self) -> String {
        "aa:bb:cc:dd:ee:ff".to_string()
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, _service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        if self.fail_subscribe.contains(&characteristic) {
            return Err(LinkError::ServiceNotFound(characteristic));
        }
        self.subscribed.lock().unwrap().push(characteristic);
        Ok(())
    }

    async fn resolve(&self, _service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        if self.fail_subscribe.contains(&characteristic) {
            return Err(LinkError::ServiceNotFound(characteristic));
        }
        Ok(())
    }

    async fn write(
        &self,
        _service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        self.writes.lock().unwrap().push((characteristic, payload.to_vec()));
        Ok(())
    }

    async fn read(&self, _service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, LinkError> {
        if characteristic == u(gatt::MODEL_NUMBER) {
            Ok(self.model.to_le_bytes().to_vec())
        } else {
            Err(LinkError::ServiceNotFound(characteristic))
        }
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, LinkError> {
        let rx = self
            .notif_rx
            .lock()
            .unwrap()
            .take()
            .expect("notifications requested twice on one link");
        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|n| (n, rx))
        })
        .boxed())
    }

    async fn closed(&self) {
        self.closed.notified().await;
    }
}

pub struct MockProvider {
    pub open_delay: Mutex<Duration>,
    pub fail_next_open: Mutex<Option<LinkError>>,
    pub fail_subscribe: Mutex<HashSet<Uuid>>,
    pub model: Mutex<u32>,
    pub open_calls: AtomicUsize,
    pub opened: Mutex<Vec<Arc<MockLink>>>,
    pub filters: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            open_delay: Mutex::new(Duration::from_millis(50)),
            fail_next_open: Mutex::new(None),
            fail_subscribe: Mutex::new(HashSet::new()),
            model: Mutex::new(9903),
            open_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }
}

impl MockProvider {
    pub fn link(&self, index: usize) -> Arc<MockLink> {
        self.opened.lock().unwrap()[index].clone()
    }

    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkProvider for MockProvider {
    async fn open(&self, filter: &LinkFilter) -> Result<Arc<dyn Link>, LinkError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.filters
            .lock()
            .unwrap()
            .push((filter.name.clone(), filter.known_id.clone()));
        let delay = *self.open_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if let Some(error) = self.fail_next_open.lock().unwrap().take() {
            return Err(error);
        }
        let link = Arc::new(MockLink::new(
            *self.model.lock().unwrap(),
            self.fail_subscribe.lock().unwrap().clone(),
        ));
        self.opened.lock().unwrap().push(link.clone());
        Ok(link)
    }
}

/// A device over a fresh mock provider, with a recording handler installed.
pub fn setup(config: DeviceConfig) -> (Arc<MockProvider>, Microbit, mpsc::UnboundedReceiver<String>) {
    let provider = Arc::new(MockProvider::default());
    let microbit = Microbit::new(provider.clone(), config);
    let (recorder, rx) = Recorder::new();
    microbit.set_handler(recorder);
    (provider, microbit, rx)
}

/// Records lifecycle events as compact tags, in delivery order.
pub struct Recorder {
    tx: mpsc::UnboundedSender<String>,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl DeviceHandler for Recorder {
    fn on_event(&self, event: DeviceEvent) {
        let _ = self.tx.send(tag(&event));
    }
}

pub fn tag(event: &DeviceEvent) -> String {
    match event {
        DeviceEvent::Connecting => "connecting".to_string(),
        DeviceEvent::Initializing => "initializing".to_string(),
        DeviceEvent::Connected(version) => format!("connected:{version:?}"),
        DeviceEvent::Disconnected => "disconnected".to_string(),
        DeviceEvent::Reconnecting => "reconnecting".to_string(),
        DeviceEvent::ConnectError(Error::ConnectTimeout(_)) => "connect-error:timeout".to_string(),
        DeviceEvent::ConnectError(_) => "connect-error".to_string(),
        DeviceEvent::ReconnectError(Error::ConnectTimeout(_)) => {
            "reconnect-error:timeout".to_string()
        }
        DeviceEvent::ReconnectError(_) => "reconnect-error".to_string(),
        DeviceEvent::Closed => "closed".to_string(),
    }
}

/// Wait for the next events and assert they match, in order.
pub async fn expect_events(rx: &mut mpsc::UnboundedReceiver<String>, expected: &[&str]) {
    for want in expected {
        let got = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for '{want}'"))
            .expect("event channel closed");
        assert_eq!(got, *want);
    }
}

/// Assert no further events are pending (after letting tasks settle).
pub async fn expect_quiet(rx: &mut mpsc::UnboundedReceiver<String>) {
    tokio::time::sleep(Duration::from_millis(5)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected event '{event}'");
    }
}

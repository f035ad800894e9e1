//! Wireless link boundary
//!
//! The lifecycle manager and service layer talk to the transport through the
//! [`LinkProvider`] and [`Link`] traits. The production implementation sits
//! on top of btleplug; tests substitute an in-memory mock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{BoxStream, StreamExt};
use uuid::Uuid;

use crate::error::LinkError;
use bitlink_proto::gatt;

/// How long to scan before giving up on discovery.
const SCAN_DURATION: Duration = Duration::from_secs(5);

/// A raw notification from a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Which peripheral to open.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    /// Five-letter micro:bit name, narrowing the scan to
    /// `BBC micro:bit [<name>]`. Without it, any micro:bit matches.
    pub name: Option<String>,
    /// Address of a previously connected peripheral; takes priority over
    /// name matching so a reconnect lands on the same board.
    pub known_id: Option<String>,
}

/// One live wireless session with a peripheral.
#[async_trait]
pub trait Link: Send + Sync {
    /// Transport-level identifier, stable across reconnects.
    fn id(&self) -> String;

    /// Advertised name, if the peripheral reported one.
    fn name(&self) -> Option<String>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<(), LinkError>;

    /// Start notifications on a characteristic.
    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError>;

    /// Check that a writable characteristic exists without touching it.
    async fn resolve(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError>;

    async fn write(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), LinkError>;

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, LinkError>;

    /// Stream of notifications across all subscribed characteristics.
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, LinkError>;

    /// Resolves when the link drops unexpectedly. Never resolves for an
    /// orderly local disconnect.
    async fn closed(&self);
}

/// Opens links to peripherals matching a filter.
#[async_trait]
pub trait LinkProvider: Send + Sync {
    async fn open(&self, filter: &LinkFilter) -> Result<Arc<dyn Link>, LinkError>;
}

/// Parse a UUID constant from `bitlink_proto::gatt`.
pub(crate) fn uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in bitlink_proto")
}

/// btleplug-backed [`LinkProvider`] using the default Bluetooth adapter.
pub struct BleLinkProvider {
    adapter: Adapter,
}

impl BleLinkProvider {
    pub async fn new() -> Result<Self, LinkError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(LinkError::PlatformUnsupported)?;
        Ok(Self { adapter })
    }

    async fn matches(
        &self,
        peripheral: &Peripheral,
        filter: &LinkFilter,
    ) -> Result<Option<String>, LinkError> {
        let Some(props) = peripheral.properties().await? else {
            return Ok(None);
        };
        let name = props.local_name.unwrap_or_default();

        if let Some(known_id) = &filter.known_id {
            if peripheral.address().to_string() == *known_id {
                return Ok(Some(name));
            }
            return Ok(None);
        }

        let prefix = match &filter.name {
            Some(n) => format!("{} [{}]", gatt::NAME_PREFIX, n),
            None => gatt::NAME_PREFIX.to_string(),
        };
        if name.starts_with(&prefix) {
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl LinkProvider for BleLinkProvider {
    async fn open(&self, filter: &LinkFilter) -> Result<Arc<dyn Link>, LinkError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(SCAN_DURATION).await;
        let peripherals = self.adapter.peripherals().await?;
        self.adapter.stop_scan().await?;

        for peripheral in peripherals {
            if let Some(name) = self.matches(&peripheral, filter).await? {
                tracing::debug!(%name, "connecting to peripheral");
                peripheral.connect().await?;
                peripheral.discover_services().await?;
                return Ok(Arc::new(BleLink {
                    adapter: self.adapter.clone(),
                    peripheral,
                    name,
                }));
            }
        }

        Err(LinkError::NotFound)
    }
}

struct BleLink {
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
}

impl BleLink {
    fn find_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, LinkError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or(LinkError::ServiceNotFound(characteristic))
    }
}

#[async_trait]
impl Link for BleLink {
    fn id(&self) -> String {
        self.peripheral.address().to_string()
    }

    fn name(&self) -> Option<String> {
        if self.name.is_empty() {
            None
        } else {
            Some(self.name.clone())
        }
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        Ok(self.peripheral.disconnect().await?)
    }

    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        let c = self.find_characteristic(service, characteristic)?;
        Ok(self.peripheral.subscribe(&c).await?)
    }

    async fn resolve(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        self.find_characteristic(service, characteristic).map(|_| ())
    }

    async fn write(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let c = self.find_characteristic(service, characteristic)?;
        Ok(self
            .peripheral
            .write(&c, payload, WriteType::WithResponse)
            .await?)
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, LinkError> {
        let c = self.find_characteristic(service, characteristic)?;
        Ok(self.peripheral.read(&c).await?)
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, LinkError> {
        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .map(|n| Notification {
                characteristic: n.uuid,
                value: n.value,
            })
            .boxed())
    }

    async fn closed(&self) {
        let id = self.peripheral.id();
        let mut events = match self.adapter.events().await {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(%error, "cannot watch adapter events; disconnects will go unnoticed");
                futures::future::pending::<()>().await;
                return;
            }
        };
        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDisconnected(peripheral_id) = event {
                if peripheral_id == id {
                    return;
                }
            }
        }
        // Event stream ended; nothing more to observe.
        futures::future::pending::<()>().await;
    }
}

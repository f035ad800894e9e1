//! Application-facing facade
//!
//! Thin wrapper over [`BleDevice`]: forwards commands to the lifecycle
//! manager and exposes the last-known peripheral metadata.

use std::sync::Arc;

use crate::device::{BleDevice, ConnectionState, DeviceConfig};
use crate::error::Error;
use crate::handler::DeviceHandler;
use crate::link::{BleLinkProvider, LinkProvider};
use bitlink_proto::{ButtonState, MicrobitVersion};

/// A BBC micro:bit reachable over BLE.
pub struct Microbit {
    device: BleDevice,
}

impl Microbit {
    /// Build a micro:bit client over any link provider. Must be called from
    /// within a tokio runtime.
    pub fn new(provider: Arc<dyn LinkProvider>, config: DeviceConfig) -> Self {
        Self {
            device: BleDevice::new(provider, config),
        }
    }

    /// Build a micro:bit client over the default Bluetooth adapter.
    pub async fn with_default_adapter(config: DeviceConfig) -> Result<Self, Error> {
        let provider = BleLinkProvider::new().await.map_err(Error::LinkUnavailable)?;
        Ok(Self::new(Arc::new(provider), config))
    }

    /// Connect (or reconnect) to the device. No-op unless the device is at
    /// rest. Progress and errors are reported to the registered handler.
    pub async fn connect(&self) {
        self.device.connect().await;
    }

    /// Disconnect on user request: disables auto-reconnect, then releases
    /// the link.
    pub async fn disconnect(&self) {
        self.device.close().await;
    }

    /// Full teardown; equivalent to [`disconnect`](Self::disconnect).
    pub async fn close(&self) {
        self.device.close().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.device.state()
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.device.set_auto_reconnect(enabled);
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.device.is_auto_reconnect_enabled()
    }

    /// Last-known hardware revision; survives disconnects.
    pub fn version(&self) -> Option<MicrobitVersion> {
        self.device.identity().version
    }

    /// Last-known advertised name; survives disconnects.
    pub fn name(&self) -> Option<String> {
        self.device.identity().name
    }

    /// Register the single lifecycle event handler.
    pub fn set_handler(&self, handler: Arc<dyn DeviceHandler>) {
        self.device.set_handler(handler);
    }

    pub fn on_accelerometer(&self, callback: impl Fn(i16, i16, i16) + Send + Sync + 'static) {
        self.device.on_accelerometer(callback);
    }

    pub fn on_button_a(&self, callback: impl Fn(ButtonState) + Send + Sync + 'static) {
        self.device.on_button_a(callback);
    }

    pub fn on_button_b(&self, callback: impl Fn(ButtonState) + Send + Sync + 'static) {
        self.device.on_button_b(callback);
    }

    pub fn on_text(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.device.on_text(callback);
    }

    pub async fn send_text(&self, message: &str) -> Result<(), Error> {
        self.device.send_text(message).await
    }

    pub async fn set_led_matrix(&self, matrix: &[Vec<bool>]) -> Result<(), Error> {
        self.device.set_led_matrix(matrix).await
    }
}

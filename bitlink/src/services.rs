//! Peripheral service protocol layer
//!
//! A [`ServiceSet`] is built fresh on every successful initialization pass:
//! it subscribes to the four notification capabilities in a fixed order,
//! checks the two write handles, and runs one pump task that decodes inbound
//! notifications and dispatches them to the shared callback table. Dropping
//! the set aborts the pump, so a dead link can never deliver stale events.

use std::sync::{Arc, Mutex};

use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, LinkError};
use crate::link::{uuid, Link};
use bitlink_proto::{codec, gatt, ButtonState, Capability};

type AccelCallback = Arc<dyn Fn(i16, i16, i16) + Send + Sync>;
type ButtonCallback = Arc<dyn Fn(ButtonState) + Send + Sync>;
type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-capability callback table. One callback per capability; registering a
/// new one replaces the old. Shared between the lifecycle manager and every
/// ServiceSet generation, so registrations survive reconnects.
#[derive(Default)]
pub(crate) struct Callbacks {
    accelerometer: Mutex<Option<AccelCallback>>,
    button_a: Mutex<Option<ButtonCallback>>,
    button_b: Mutex<Option<ButtonCallback>>,
    text: Mutex<Option<TextCallback>>,
}

impl Callbacks {
    pub fn set_accelerometer(&self, callback: AccelCallback) {
        *self.accelerometer.lock().expect("callback table poisoned") = Some(callback);
    }

    pub fn set_button_a(&self, callback: ButtonCallback) {
        *self.button_a.lock().expect("callback table poisoned") = Some(callback);
    }

    pub fn set_button_b(&self, callback: ButtonCallback) {
        *self.button_b.lock().expect("callback table poisoned") = Some(callback);
    }

    pub fn set_text(&self, callback: TextCallback) {
        *self.text.lock().expect("callback table poisoned") = Some(callback);
    }

    /// Decode a notification payload and invoke the registered callback.
    /// No callback registered means the event is dropped; capabilities are
    /// opt-in. Undecodable payloads are logged and dropped.
    fn dispatch(&self, capability: Capability, payload: &[u8]) {
        match capability {
            Capability::Accelerometer => match codec::decode_accelerometer(payload) {
                Ok((x, y, z)) => {
                    let callback = self.accelerometer.lock().expect("callback table poisoned").clone();
                    if let Some(callback) = callback {
                        callback(x, y, z);
                    }
                }
                Err(error) => tracing::warn!(%error, "bad accelerometer payload"),
            },
            Capability::ButtonA | Capability::ButtonB => match codec::decode_button(payload) {
                Ok(state) => {
                    let slot = match capability {
                        Capability::ButtonA => &self.button_a,
                        _ => &self.button_b,
                    };
                    let callback = slot.lock().expect("callback table poisoned").clone();
                    if let Some(callback) = callback {
                        callback(state);
                    }
                }
                Err(error) => tracing::warn!(%error, "bad button payload"),
            },
            Capability::UartIn => {
                let message = codec::decode_text(payload);
                let callback = self.text.lock().expect("callback table poisoned").clone();
                if let Some(callback) = callback {
                    callback(&message);
                }
            }
        }
    }
}

fn capability_for(characteristic: Uuid) -> Option<Capability> {
    Capability::ALL
        .into_iter()
        .find(|c| uuid(c.characteristic()) == characteristic)
}

/// Live subscriptions and write handles for one connection generation.
pub(crate) struct ServiceSet {
    link: Arc<dyn Link>,
    pump: JoinHandle<()>,
}

impl ServiceSet {
    /// Subscribe to all capabilities in fixed order, failing fast on the
    /// first error, then verify the write handles and start the pump.
    pub async fn initialize(
        link: Arc<dyn Link>,
        callbacks: Arc<Callbacks>,
    ) -> Result<Self, LinkError> {
        for capability in Capability::ALL {
            tracing::debug!(?capability, "subscribing");
            link.subscribe(uuid(capability.service()), uuid(capability.characteristic()))
                .await?;
        }

        link.resolve(uuid(gatt::UART_SERVICE), uuid(gatt::UART_RX)).await?;
        link.resolve(uuid(gatt::LED_SERVICE), uuid(gatt::LED_MATRIX_STATE)).await?;

        let mut stream = link.notifications().await?;
        let pump = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                match capability_for(notification.characteristic) {
                    Some(capability) => callbacks.dispatch(capability, &notification.value),
                    None => tracing::trace!(
                        characteristic = %notification.characteristic,
                        "notification on unmapped characteristic"
                    ),
                }
            }
        });

        Ok(Self { link, pump })
    }

    /// Encode and write a UART message.
    pub async fn send_text(&self, message: &str) -> Result<(), Error> {
        let payload = codec::encode_text(message);
        self.link
            .write(uuid(gatt::UART_SERVICE), uuid(gatt::UART_RX), &payload)
            .await
            .map_err(Error::WriteFailed)
    }

    /// Validate, pack and write a 5x5 LED matrix.
    pub async fn set_led_matrix(&self, matrix: &[Vec<bool>]) -> Result<(), Error> {
        let payload = codec::pack_matrix(matrix)?;
        self.link
            .write(uuid(gatt::LED_SERVICE), uuid(gatt::LED_MATRIX_STATE), &payload)
            .await
            .map_err(Error::WriteFailed)
    }
}

impl Drop for ServiceSet {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

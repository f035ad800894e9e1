//! bitlink - BBC micro:bit BLE client
//!
//! Manages the lifecycle of a wireless connection to one micro:bit and the
//! binary protocol of its sensor and actuator services: accelerometer and
//! button notifications in, UART text both ways, LED matrix writes out.
//!
//! # Example
//!
//! ```ignore
//! use bitlink::{DeviceConfig, Microbit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bitlink::Error> {
//!     let microbit = Microbit::with_default_adapter(DeviceConfig::default()).await?;
//!     microbit.on_button_a(|state| println!("button A: {state:?}"));
//!     microbit.set_auto_reconnect(true);
//!     microbit.connect().await;
//!     microbit.send_text("hello").await?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod handler;
pub mod link;
pub mod microbit;
mod services;

pub use device::{
    BleDevice, ConnectionState, DeviceConfig, PeripheralIdentity, DEFAULT_CONNECT_TIMEOUT,
};
pub use error::{AttemptError, Error, LinkError};
pub use handler::{DeviceEvent, DeviceHandler};
pub use link::{BleLinkProvider, Link, LinkFilter, LinkProvider, Notification};
pub use microbit::Microbit;

pub use bitlink_proto as proto;
pub use bitlink_proto::{ButtonState, MicrobitVersion};

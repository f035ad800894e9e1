//! Monitor - connect to a micro:bit and stream its sensors
//!
//! Usage:
//!   cargo run --example monitor -p bitlink -- [name]
//!
//! Pass the five-letter micro:bit name (e.g. "vatav") to connect to a
//! specific board; without it, the first micro:bit found is used. Prints
//! lifecycle transitions, accelerometer samples, button presses and UART
//! text until interrupted.

use std::sync::Arc;

use bitlink::{DeviceConfig, DeviceEvent, DeviceHandler, Microbit};

struct PrintHandler;

impl DeviceHandler for PrintHandler {
    fn on_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(version) => println!("connected ({version:?})"),
            DeviceEvent::ConnectError(error) => println!("connect error: {error}"),
            DeviceEvent::ReconnectError(error) => println!("reconnect error: {error}"),
            other => println!("{other:?}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig {
        name: std::env::args().nth(1),
        auto_reconnect: true,
        ..DeviceConfig::default()
    };

    let microbit = Microbit::with_default_adapter(config).await?;
    microbit.set_handler(Arc::new(PrintHandler));

    microbit.on_accelerometer(|x, y, z| println!("accel: x={x} y={y} z={z}"));
    microbit.on_button_a(|state| println!("button A: {state:?}"));
    microbit.on_button_b(|state| println!("button B: {state:?}"));
    microbit.on_text(|text| println!("uart: {text}"));

    microbit.connect().await;

    if let Some(name) = microbit.name() {
        println!("device: {name}");
        // Greet the board on its LED grid.
        let smile = vec![
            vec![false, true, false, true, false],
            vec![false, true, false, true, false],
            vec![false, false, false, false, false],
            vec![true, false, false, false, true],
            vec![false, true, true, true, false],
        ];
        microbit.set_led_matrix(&smile).await?;
    }

    tokio::signal::ctrl_c().await?;
    microbit.close().await;
    Ok(())
}

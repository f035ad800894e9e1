//! GATT profile constants for the BBC micro:bit
//!
//! Service and characteristic UUIDs for the four capabilities the client
//! subscribes to plus the two write channels. The capability -> UUID mapping
//! is a fixed table; nothing is looked up by string matching at runtime.

/// Advertised name prefix shared by all micro:bits.
pub const NAME_PREFIX: &str = "BBC micro:bit";

/// Accelerometer Service UUID
pub const ACCEL_SERVICE: &str = "e95d0753-251d-470a-a062-fa1922dfa9a8";

/// Accelerometer Data Characteristic UUID (notify, 6 bytes)
pub const ACCEL_DATA: &str = "e95dca4b-251d-470a-a062-fa1922dfa9a8";

/// Button Service UUID
pub const BUTTON_SERVICE: &str = "e95d9882-251d-470a-a062-fa1922dfa9a8";

/// Button A State Characteristic UUID (notify, 1 byte)
pub const BUTTON_A_STATE: &str = "e95dda90-251d-470a-a062-fa1922dfa9a8";

/// Button B State Characteristic UUID (notify, 1 byte)
pub const BUTTON_B_STATE: &str = "e95dda91-251d-470a-a062-fa1922dfa9a8";

/// UART Service UUID (Nordic UART layout)
pub const UART_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// UART TX Characteristic UUID - the micro:bit transmits, the client subscribes
pub const UART_TX: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// UART RX Characteristic UUID - the client writes, the micro:bit receives
pub const UART_RX: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// LED Service UUID
pub const LED_SERVICE: &str = "e95dd91d-251d-470a-a062-fa1922dfa9a8";

/// LED Matrix State Characteristic UUID (write, 5 bytes)
pub const LED_MATRIX_STATE: &str = "e95d7b77-251d-470a-a062-fa1922dfa9a8";

/// Device Information Service UUID
pub const DEVICE_INFO_SERVICE: &str = "0000180a-0000-1000-8000-00805f9b34fb";

/// Model Number Characteristic UUID (read, 32-bit LE)
pub const MODEL_NUMBER: &str = "00002a24-0000-1000-8000-00805f9b34fb";

/// A notification source the client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Accelerometer,
    ButtonA,
    ButtonB,
    UartIn,
}

impl Capability {
    /// All capabilities, in the order the client subscribes to them.
    pub const ALL: [Capability; 4] = [
        Capability::Accelerometer,
        Capability::ButtonA,
        Capability::ButtonB,
        Capability::UartIn,
    ];

    /// UUID of the service this capability lives in.
    pub fn service(self) -> &'static str {
        match self {
            Capability::Accelerometer => ACCEL_SERVICE,
            Capability::ButtonA | Capability::ButtonB => BUTTON_SERVICE,
            Capability::UartIn => UART_SERVICE,
        }
    }

    /// UUID of the notifying characteristic.
    pub fn characteristic(self) -> &'static str {
        match self {
            Capability::Accelerometer => ACCEL_DATA,
            Capability::ButtonA => BUTTON_A_STATE,
            Capability::ButtonB => BUTTON_B_STATE,
            Capability::UartIn => UART_TX,
        }
    }
}

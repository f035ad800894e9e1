//! micro:bit BLE wire protocol - GATT constants and payload codecs
//!
//! Pure data layer shared by the `bitlink` client crate: the UUIDs of the
//! micro:bit's Bluetooth profile, the byte-level encoders/decoders for its
//! notification and write payloads, and the pairing-pattern codebook. No
//! I/O happens here.

pub mod codec;
pub mod gatt;
pub mod pattern;

pub use codec::{
    decode_accelerometer, decode_button, decode_model_number, decode_text, encode_text,
    pack_matrix, version_for_model, ButtonState, CodecError, MicrobitVersion,
    MODEL_NUMBER_CUTOFF,
};
pub use gatt::Capability;

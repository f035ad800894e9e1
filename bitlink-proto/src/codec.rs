//! Payload codecs for the micro:bit's notification and write characteristics
//!
//! All multi-byte fields are little-endian. Decoders take the raw bytes of a
//! single notification; encoders produce the exact bytes to write.

/// Model numbers below this value identify a v1 board; at or above, a v2.
pub const MODEL_NUMBER_CUTOFF: u32 = 9903;

/// Hardware revision of a micro:bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrobitVersion {
    V1,
    V2,
}

/// State reported by a button notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
    LongPressed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("LED matrix must be 5x5, got {rows}x{cols}")]
    ShapeMismatch { rows: usize, cols: usize },

    #[error("micro:bit name must be {expected} characters, got {actual}")]
    BadNameLength { expected: usize, actual: usize },
}

/// Decode an accelerometer notification: three signed 16-bit LE integers,
/// x at offset 0, y at offset 2, z at offset 4.
pub fn decode_accelerometer(data: &[u8]) -> Result<(i16, i16, i16), CodecError> {
    if data.len() < 6 {
        return Err(CodecError::Truncated { expected: 6, actual: data.len() });
    }
    let x = i16::from_le_bytes([data[0], data[1]]);
    let y = i16::from_le_bytes([data[2], data[3]]);
    let z = i16::from_le_bytes([data[4], data[5]]);
    Ok((x, y, z))
}

/// Decode a button notification. The micro:bit sends 0 for released, 1 for
/// pressed and 2 for long-pressed; any other byte is treated as released.
pub fn decode_button(data: &[u8]) -> Result<ButtonState, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Truncated { expected: 1, actual: 0 });
    }
    Ok(match data[0] {
        1 => ButtonState::Pressed,
        2 => ButtonState::LongPressed,
        _ => ButtonState::Released,
    })
}

/// Decode a UART notification: one character per byte. Non-ASCII content is
/// lossy by protocol design, not something to repair here.
pub fn decode_text(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

/// Encode a UART message: one byte per character code point, truncating.
/// No length cap; the write characteristic's own limit is the bound.
pub fn encode_text(message: &str) -> Vec<u8> {
    message.chars().map(|c| c as u8).collect()
}

/// Pack a 5x5 boolean matrix into the 5-byte LED write payload. Each row
/// becomes one byte, MSB-first by column: column 0 -> bit 4 ... column 4 ->
/// bit 0. Any other shape fails before a single byte is produced.
pub fn pack_matrix(matrix: &[Vec<bool>]) -> Result<[u8; 5], CodecError> {
    if matrix.len() != 5 {
        return Err(CodecError::ShapeMismatch {
            rows: matrix.len(),
            cols: matrix.first().map_or(0, Vec::len),
        });
    }
    let mut packed = [0u8; 5];
    for (row, cells) in matrix.iter().enumerate() {
        if cells.len() != 5 {
            return Err(CodecError::ShapeMismatch { rows: 5, cols: cells.len() });
        }
        for (col, &lit) in cells.iter().enumerate() {
            if lit {
                packed[row] |= 1 << (4 - col);
            }
        }
    }
    Ok(packed)
}

/// Decode the model number read: a single unsigned 32-bit LE value.
pub fn decode_model_number(data: &[u8]) -> Result<u32, CodecError> {
    if data.len() < 4 {
        return Err(CodecError::Truncated { expected: 4, actual: data.len() });
    }
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Map a model number to a hardware revision by the vendor cutoff.
pub fn version_for_model(model: u32) -> MicrobitVersion {
    if model < MODEL_NUMBER_CUTOFF {
        MicrobitVersion::V1
    } else {
        MicrobitVersion::V2
    }
}

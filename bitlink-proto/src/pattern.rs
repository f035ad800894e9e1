//! Pairing pattern codec
//!
//! Every micro:bit has a five-letter name derived from the 5x5 LED pattern
//! shown during pairing. Each column encodes one letter: the first lit row
//! in a column selects a letter from the codebook, and all rows below the
//! selected one are also lit.

use crate::codec::CodecError;

/// Names and patterns are always 5 columns wide.
pub const NAME_LENGTH: usize = 5;

const CODEBOOK: [[char; 5]; 5] = [
    ['t', 'a', 't', 'a', 't'],
    ['p', 'e', 'p', 'e', 'p'],
    ['g', 'i', 'g', 'i', 'g'],
    ['v', 'o', 'v', 'o', 'v'],
    ['z', 'u', 'z', 'u', 'z'],
];

/// Convert a pairing pattern to the device name. A column with no lit cell
/// yields a space, matching no real device name.
pub fn pattern_to_name(pattern: &[Vec<bool>]) -> Result<String, CodecError> {
    if pattern.len() != NAME_LENGTH {
        return Err(CodecError::ShapeMismatch {
            rows: pattern.len(),
            cols: pattern.first().map_or(0, Vec::len),
        });
    }
    for row in pattern {
        if row.len() != NAME_LENGTH {
            return Err(CodecError::ShapeMismatch { rows: NAME_LENGTH, cols: row.len() });
        }
    }

    let mut name = String::with_capacity(NAME_LENGTH);
    for col in 0..NAME_LENGTH {
        let mut letter = ' ';
        for row in 0..NAME_LENGTH {
            if pattern[row][col] {
                letter = CODEBOOK[row][col];
                break;
            }
        }
        name.push(letter);
    }
    Ok(name)
}

/// Convert a device name back to its pairing pattern.
pub fn name_to_pattern(name: &str) -> Result<Vec<Vec<bool>>, CodecError> {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() != NAME_LENGTH {
        return Err(CodecError::BadNameLength {
            expected: NAME_LENGTH,
            actual: chars.len(),
        });
    }

    let mut pattern = vec![vec![true; NAME_LENGTH]; NAME_LENGTH];
    for col in 0..NAME_LENGTH {
        for row in 0..NAME_LENGTH {
            if CODEBOOK[row][col] == chars[col] {
                break;
            }
            pattern[row][col] = false;
        }
    }
    Ok(pattern)
}

//! Stateless helpers shared by both marshalling paths.

mod crc;
mod hex;

pub use crc::{CRC8_POLY, Crc8, crc8};
pub use hex::{from_hex, to_hex};

/// Least significant byte of a 16-bit word.
#[must_use]
pub const fn low_byte(value: u16) -> u8 {
    (value & 0x00FF) as u8
}

/// Most significant byte of a 16-bit word.
#[must_use]
pub const fn high_byte(value: u16) -> u8 {
    (value >> 8) as u8
}

/// Assemble a 16-bit word from its little-endian byte pair.
#[must_use]
pub const fn u16_from_le(low: u8, high: u8) -> u16 {
    u16::from_le_bytes([low, high])
}
